use std::fs;

use pretty_assertions::assert_eq;
use shorts_core::ContentRecord;
use shorts_engine::{
    deterministic_filename, ensure_output_dir, AtomicFileWriter, JsonDirRecordStore,
    MemoryRecordStore, RecordStore, StoreError,
};
use tempfile::TempDir;

fn record(title: &str) -> ContentRecord {
    ContentRecord::new(title, "A body long enough to matter.", "https://grace.org/s/1")
        .unwrap()
        .with_reference(Some("John 3:16".to_string()))
}

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("records");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("request.json", b"hello").unwrap();
    let second = writer.write("request.json", b"world").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "world");
}

#[test]
fn writing_under_a_file_fails_without_leftovers() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    fs::write(&blocker, "x").unwrap();

    let result = AtomicFileWriter::new(blocker.clone()).write("record.json", b"{}");
    assert!(result.is_err());
    assert!(!blocker.with_file_name("record.json").exists());
}

#[test]
fn filenames_are_sanitized_and_stable() {
    let name = deterministic_filename(Some("  Grace: Not Earned? "), "key-1", "json");
    assert!(name.starts_with("Grace_Not_Earned--"), "{name}");
    assert!(name.ends_with(".json"));
    assert_eq!(
        name,
        deterministic_filename(Some("  Grace: Not Earned? "), "key-1", "json")
    );
    assert_ne!(name, deterministic_filename(Some("  Grace: Not Earned? "), "key-2", "json"));
    assert!(deterministic_filename(None, "k", "mp4").starts_with("untitled--"));
}

#[test]
fn json_store_writes_one_file_per_record() {
    let temp = TempDir::new().unwrap();
    let store = JsonDirRecordStore::new(temp.path().join("records"));

    let first = store.save(&record("Living Water")).unwrap();
    let second = store.save(&record("Living Water")).unwrap();
    assert_ne!(first, second);

    let files: Vec<_> = fs::read_dir(temp.path().join("records"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 2);
    let saved: ContentRecord =
        serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(saved, record("Living Water"));
}

#[test]
fn json_store_reports_unwritable_directory() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("file");
    fs::write(&blocker, "x").unwrap();

    let err = JsonDirRecordStore::new(blocker)
        .save(&record("Living Water"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Persist(_)), "{err:?}");
}

#[test]
fn memory_store_assigns_sequential_ids() {
    let store = MemoryRecordStore::new();
    assert!(store.is_empty());
    assert_eq!(store.save(&record("First sermon")).unwrap(), "record-1");
    assert_eq!(store.save(&record("Second sermon")).unwrap(), "record-2");
    assert_eq!(store.len(), 2);
    assert_eq!(store.records()[1].1.title(), "Second sermon");
}
