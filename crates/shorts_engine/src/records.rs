use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use shorts_core::ContentRecord;

use crate::{deterministic_filename, AtomicFileWriter, RecordId, RecordStore, StoreError};

/// In-process record store, used by dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<Vec<(RecordId, ContentRecord)>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(RecordId, ContentRecord)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryRecordStore {
    fn save(&self, record: &ContentRecord) -> Result<RecordId, StoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let id = format!("record-{}", records.len() + 1);
        records.push((id.clone(), record.clone()));
        Ok(id)
    }
}

/// One pretty-printed JSON file per saved record.
#[derive(Debug)]
pub struct JsonDirRecordStore {
    writer: AtomicFileWriter,
    seq: AtomicU64,
}

impl JsonDirRecordStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            seq: AtomicU64::new(0),
        }
    }
}

impl RecordStore for JsonDirRecordStore {
    fn save(&self, record: &ContentRecord) -> Result<RecordId, StoreError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}-{seq}", Utc::now().format("%Y%m%dT%H%M%S%3f"));
        let filename = deterministic_filename(Some(record.title()), &id, "json");
        self.writer.write_json(&filename, record)?;
        Ok(id)
    }
}
