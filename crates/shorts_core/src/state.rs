use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Stage of a single item's pipeline. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ItemStage {
    Pending,
    Fetching,
    Extracting,
    Persisting,
    Composing,
    Rendering,
    Publishing,
    Succeeded,
    Failed,
}

impl ItemStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStage::Succeeded | ItemStage::Failed)
    }

    /// Short stage name recorded with failures (`fetch`, `render`, ...).
    pub fn name(self) -> &'static str {
        match self {
            ItemStage::Pending => "pending",
            ItemStage::Fetching => "fetch",
            ItemStage::Extracting => "extract",
            ItemStage::Persisting => "persist",
            ItemStage::Composing => "compose",
            ItemStage::Rendering => "render",
            ItemStage::Publishing => "publish",
            ItemStage::Succeeded => "succeeded",
            ItemStage::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a stage failure should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Malformed or empty content; never retried.
    Validation,
    /// Timeouts, connection failures, 5xx; the item may be retried.
    Transient,
    /// Anything else a retry cannot fix.
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: ItemStage,
    pub class: ErrorClass,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: ItemStage, class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            stage,
            class,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class == ErrorClass::Transient
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// Mutable state of one pipeline execution.
///
/// Moves strictly forward through [`ItemStage`] and stops at `Succeeded` or
/// `Failed`. Backward or post-terminal transitions are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemState {
    url: String,
    stage: ItemStage,
    entered: Vec<(ItemStage, DateTime<Utc>)>,
    failure: Option<StageFailure>,
}

impl ItemState {
    pub fn new(url: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            stage: ItemStage::Pending,
            entered: vec![(ItemStage::Pending, at)],
            failure: None,
        }
    }

    /// Enter `next`. Returns false when the transition would go backwards.
    pub fn advance(&mut self, next: ItemStage, at: DateTime<Utc>) -> bool {
        if self.stage.is_terminal() || next <= self.stage || next == ItemStage::Failed {
            return false;
        }
        self.stage = next;
        self.entered.push((next, at));
        true
    }

    /// Terminate with a failure in the current stage.
    pub fn fail(&mut self, class: ErrorClass, message: impl Into<String>, at: DateTime<Utc>) {
        if self.stage.is_terminal() {
            return;
        }
        self.failure = Some(StageFailure::new(self.stage, class, message));
        self.stage = ItemStage::Failed;
        self.entered.push((ItemStage::Failed, at));
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stage(&self) -> ItemStage {
        self.stage
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    pub fn entered_at(&self, stage: ItemStage) -> Option<DateTime<Utc>> {
        self.entered
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, at)| *at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchStatus::Queued => "queued",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Counter {
    Processed,
    Successful,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchState {
    pub status: BatchStatus,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BatchState {
    pub fn new(total: u64, at: DateTime<Utc>) -> Self {
        Self {
            status: BatchStatus::Queued,
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Processed => self.processed,
            Counter::Successful => self.successful,
            Counter::Failed => self.failed,
        }
    }

    pub(crate) fn counter_mut(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Processed => &mut self.processed,
            Counter::Successful => &mut self.successful,
            Counter::Failed => &mut self.failed,
        }
    }

    /// Increment `counter` and return its new value.
    pub fn increment(&mut self, counter: Counter, at: DateTime<Utc>) -> u64 {
        let slot = self.counter_mut(counter);
        *slot += 1;
        let value = *slot;
        self.updated_at = at;
        value
    }

    pub fn is_drained(&self) -> bool {
        self.processed >= self.total
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64 * 1000.0).round() / 10.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}
