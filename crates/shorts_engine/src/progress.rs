use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use shorts_core::{ActivityEntry, BatchState, BatchStatus, Counter};

use crate::{BatchId, ItemReport};

/// Source of "now" for timestamps and expiry.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Entries expire this long after their last write.
    pub ttl: Duration,
    /// Activity entries kept per batch; older ones are evicted first.
    pub activity_capacity: usize,
    /// Upper bound on tracked batches.
    pub max_batches: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            activity_capacity: 50,
            max_batches: 1000,
        }
    }
}

/// What the progress query surface returns for one batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub batch_id: BatchId,
    pub state: BatchState,
    pub percent: f64,
    pub recent_activity: Vec<ActivityEntry>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

struct BatchEntry {
    state: BatchState,
    activity: VecDeque<ActivityEntry>,
    items: Vec<ItemReport>,
    last_write: DateTime<Utc>,
}

/// Bounded, expiring store of batch progress, activity and item reports.
///
/// The single writer of batch state. Every operation takes one lock, so
/// updates to the same batch are linearizable and concurrent increments
/// are never lost.
pub struct ProgressStore {
    settings: StoreSettings,
    ttl: TimeDelta,
    clock: Clock,
    batches: Mutex<HashMap<BatchId, BatchEntry>>,
}

impl fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressStore")
            .field("settings", &self.settings)
            .field("batches", &self.lock().len())
            .finish()
    }
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(StoreSettings::default())
    }
}

impl ProgressStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self::with_clock(settings, Arc::new(Utc::now))
    }

    pub fn with_clock(settings: StoreSettings, clock: Clock) -> Self {
        let ttl = TimeDelta::from_std(settings.ttl).unwrap_or(TimeDelta::MAX);
        Self {
            settings,
            ttl,
            clock,
            batches: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Start tracking `id` as `Queued` with zeroed counters, replacing any previous entry.
    pub fn create_batch(&self, id: BatchId, total: u64) {
        let now = self.now();
        let mut batches = self.lock();
        self.make_room(&mut batches, id, now);
        batches.insert(
            id,
            BatchEntry {
                state: BatchState::new(total, now),
                activity: VecDeque::with_capacity(self.settings.activity_capacity),
                items: Vec::new(),
                last_write: now,
            },
        );
    }

    /// Returns false when the batch is unknown or expired.
    pub fn update_batch_status(&self, id: BatchId, status: BatchStatus) -> bool {
        self.write(id, |entry, now| {
            entry.state.status = status;
            entry.state.updated_at = now;
        })
        .is_some()
    }

    /// Atomically increment `counter` and return its new value.
    pub fn increment_counter(&self, id: BatchId, counter: Counter) -> Option<u64> {
        self.write(id, |entry, now| entry.state.increment(counter, now))
    }

    /// Prepend an activity message, evicting the oldest beyond capacity.
    pub fn append_activity(&self, id: BatchId, message: impl Into<String>) -> bool {
        let message = message.into();
        let capacity = self.settings.activity_capacity;
        self.write(id, |entry, now| {
            entry.activity.push_front(ActivityEntry {
                timestamp: now,
                message,
            });
            entry.activity.truncate(capacity);
        })
        .is_some()
    }

    pub fn record_item(&self, id: BatchId, report: ItemReport) -> bool {
        self.write(id, |entry, _| {
            entry.items.retain(|existing| existing.index != report.index);
            entry.items.push(report);
        })
        .is_some()
    }

    /// Mark a batch `Failed` before any dispatch, creating the entry if it is missing.
    pub fn fail_batch(&self, id: BatchId, total: u64, reason: impl Into<String>) {
        let now = self.now();
        let mut batches = self.lock();
        self.evict_if_expired(&mut batches, id, now);
        if !batches.contains_key(&id) {
            self.make_room(&mut batches, id, now);
        }
        let capacity = self.settings.activity_capacity;
        let entry = batches.entry(id).or_insert_with(|| BatchEntry {
            state: BatchState::new(total, now),
            activity: VecDeque::with_capacity(capacity),
            items: Vec::new(),
            last_write: now,
        });
        entry.state.status = BatchStatus::Failed;
        entry.state.updated_at = now;
        entry.activity.push_front(ActivityEntry {
            timestamp: now,
            message: reason.into(),
        });
        entry.activity.truncate(capacity);
        entry.last_write = now;
    }

    pub fn read_batch(&self, id: BatchId) -> Option<BatchState> {
        self.read(id, |entry| entry.state.clone())
    }

    /// Most recent first.
    pub fn read_activity(&self, id: BatchId) -> Vec<ActivityEntry> {
        self.read(id, |entry| entry.activity.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Item reports ordered by their position in the submitted list.
    pub fn read_items(&self, id: BatchId) -> Vec<ItemReport> {
        let mut items = self
            .read(id, |entry| entry.items.clone())
            .unwrap_or_default();
        items.sort_by_key(|report| report.index);
        items
    }

    pub fn contains(&self, id: BatchId) -> bool {
        self.read(id, |_| ()).is_some()
    }

    /// State, the `recent` newest activity entries and a completion estimate.
    pub fn snapshot(&self, id: BatchId, recent: usize) -> Option<ProgressSnapshot> {
        let now = self.now();
        self.read(id, |entry| {
            let state = entry.state.clone();
            ProgressSnapshot {
                batch_id: id,
                percent: state.progress_percent(),
                estimated_completion: estimate_completion(&state, now),
                recent_activity: entry.activity.iter().take(recent).cloned().collect(),
                state,
            }
        })
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let mut batches = self.lock();
        let before = batches.len();
        batches.retain(|_, entry| !self.is_expired(entry, now));
        before - batches.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BatchId, BatchEntry>> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &BatchEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.last_write) > self.ttl
    }

    fn evict_if_expired(
        &self,
        batches: &mut HashMap<BatchId, BatchEntry>,
        id: BatchId,
        now: DateTime<Utc>,
    ) {
        if batches
            .get(&id)
            .is_some_and(|entry| self.is_expired(entry, now))
        {
            batches.remove(&id);
        }
    }

    fn make_room(
        &self,
        batches: &mut HashMap<BatchId, BatchEntry>,
        id: BatchId,
        now: DateTime<Utc>,
    ) {
        if batches.contains_key(&id) || batches.len() < self.settings.max_batches {
            return;
        }
        batches.retain(|_, entry| !self.is_expired(entry, now));
        while batches.len() >= self.settings.max_batches.max(1) {
            let oldest = batches
                .iter()
                .min_by_key(|(_, entry)| entry.last_write)
                .map(|(key, _)| *key);
            match oldest {
                Some(key) => {
                    batches.remove(&key);
                }
                None => break,
            }
        }
    }

    fn write<T>(
        &self,
        id: BatchId,
        apply: impl FnOnce(&mut BatchEntry, DateTime<Utc>) -> T,
    ) -> Option<T> {
        let now = self.now();
        let mut batches = self.lock();
        self.evict_if_expired(&mut batches, id, now);
        let entry = batches.get_mut(&id)?;
        let result = apply(entry, now);
        entry.last_write = now;
        Some(result)
    }

    fn read<T>(&self, id: BatchId, view: impl FnOnce(&BatchEntry) -> T) -> Option<T> {
        let now = self.now();
        let mut batches = self.lock();
        self.evict_if_expired(&mut batches, id, now);
        batches.get(&id).map(view)
    }
}

fn estimate_completion(state: &BatchState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if state.processed == 0 || state.status.is_terminal() {
        return None;
    }
    let elapsed_ms = now.signed_duration_since(state.created_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return None;
    }
    let remaining = state.total.saturating_sub(state.processed) as i64;
    let remaining_ms = elapsed_ms.saturating_mul(remaining) / state.processed as i64;
    now.checked_add_signed(TimeDelta::milliseconds(remaining_ms))
}
