use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use shorts_core::{BatchState, BatchStatus, Counter, ScriptComposer};
use thiserror::Error;

use crate::{
    BatchId, Collaborators, ItemPipeline, ProgressStore, RetryPolicy, StageTimeouts, StyleOptions,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Items processed at the same time. Must be at least 1.
    pub concurrency: usize,
    /// Pause between consecutive items on the same worker.
    pub per_item_delay: Duration,
    pub retry: RetryPolicy,
    pub timeouts: StageTimeouts,
    pub style: StyleOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            per_item_delay: Duration::from_secs(2),
            retry: RetryPolicy::default(),
            timeouts: StageTimeouts::default(),
            style: StyleOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("batch {0} not found")]
    BatchNotFound(BatchId),
    #[error("invalid batch configuration: {0}")]
    InvalidConfig(String),
    #[error("batch worker failed: {0}")]
    Worker(String),
}

/// Handle to a batch running in the background.
#[derive(Debug)]
pub struct BatchHandle {
    id: BatchId,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<Result<BatchState, BatchError>>,
}

impl BatchHandle {
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Stop dispatching new items. Items already in flight run to completion.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the batch reaches a terminal status.
    pub fn wait(self) -> Result<BatchState, BatchError> {
        self.join
            .join()
            .map_err(|_| BatchError::Worker(format!("batch {} dispatcher panicked", self.id)))?
    }
}

/// Fans a list of URLs out to a bounded set of workers, each driving an
/// [`ItemPipeline`], and keeps the batch's counters and status current in
/// the shared [`ProgressStore`].
pub struct BatchOrchestrator {
    collaborators: Collaborators,
    composer: ScriptComposer,
    progress: Arc<ProgressStore>,
    next_id: AtomicU64,
    batches: Mutex<Vec<BatchId>>,
}

impl BatchOrchestrator {
    pub fn new(collaborators: Collaborators, progress: Arc<ProgressStore>) -> Self {
        Self {
            collaborators,
            composer: ScriptComposer::default(),
            progress,
            next_id: AtomicU64::new(1),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_composer(mut self, composer: ScriptComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn progress(&self) -> &Arc<ProgressStore> {
        &self.progress
    }

    /// Register a new `Queued` batch of `total` items and return its id.
    pub fn create_batch(&self, total: usize) -> BatchId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.progress.create_batch(id, total as u64);
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
        engine_info!("batch {} created with {} urls", id, total);
        id
    }

    /// Ids of batches still tracked by the progress store, oldest first.
    pub fn batch_ids(&self) -> Vec<BatchId> {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.retain(|id| self.progress.contains(*id));
        batches.clone()
    }

    /// Create a batch for `urls` and process it on a background thread.
    pub fn submit(
        &self,
        urls: Vec<String>,
        options: BatchOptions,
    ) -> Result<BatchHandle, BatchError> {
        let total = urls.len() as u64;
        let id = self.create_batch(urls.len());
        let cancel = Arc::new(AtomicBool::new(false));
        let run = self.prepare(id, options, Arc::clone(&cancel));
        let join = thread::Builder::new()
            .name(format!("shorts-batch-{id}"))
            .spawn(move || run.execute(urls))
            .map_err(|err| {
                let reason = format!("could not start batch: {err}");
                self.progress.fail_batch(id, total, reason.clone());
                BatchError::Worker(reason)
            })?;
        Ok(BatchHandle { id, cancel, join })
    }

    /// Process an already created batch on the calling thread.
    ///
    /// Unknown ids and invalid options mark the batch `Failed` without
    /// dispatching any item.
    pub fn dispatch(
        &self,
        id: BatchId,
        urls: Vec<String>,
        options: BatchOptions,
    ) -> Result<BatchState, BatchError> {
        self.prepare(id, options, Arc::new(AtomicBool::new(false)))
            .execute(urls)
    }

    fn prepare(&self, id: BatchId, options: BatchOptions, cancel: Arc<AtomicBool>) -> BatchRun {
        let pipeline = ItemPipeline::new(
            id,
            self.collaborators.clone(),
            self.composer.clone(),
            Arc::clone(&self.progress),
        )
        .with_style(options.style.clone())
        .with_timeouts(options.timeouts.clone())
        .with_retry(options.retry.clone());
        BatchRun {
            id,
            options,
            pipeline,
            progress: Arc::clone(&self.progress),
            cancel,
        }
    }
}

struct BatchRun {
    id: BatchId,
    options: BatchOptions,
    pipeline: ItemPipeline,
    progress: Arc<ProgressStore>,
    cancel: Arc<AtomicBool>,
}

impl BatchRun {
    fn execute(self, urls: Vec<String>) -> Result<BatchState, BatchError> {
        let item_count = urls.len();
        let total = item_count as u64;
        if let Err(err) = self.validate() {
            self.progress.fail_batch(self.id, total, err.to_string());
            engine_error!("batch {}: {}", self.id, err);
            return Err(err);
        }
        if !self.progress.update_batch_status(self.id, BatchStatus::Processing) {
            let err = BatchError::BatchNotFound(self.id);
            self.progress.fail_batch(self.id, total, err.to_string());
            engine_error!("{}", err);
            return Err(err);
        }
        self.progress
            .append_activity(self.id, format!("batch started with {total} urls"));
        engine_info!(
            "batch {} processing {} urls with {} workers",
            self.id,
            total,
            self.options.concurrency
        );

        let queue: Mutex<VecDeque<(usize, String)>> =
            Mutex::new(urls.into_iter().enumerate().collect());
        let workers = self.options.concurrency.min(item_count);

        thread::scope(|scope| {
            let mut started = 0;
            for worker in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("shorts-batch-{}-{worker}", self.id))
                    .spawn_scoped(scope, || self.work(&queue, total));
                match spawned {
                    Ok(_) => started += 1,
                    Err(err) => {
                        engine_warn!("batch {} worker {} not started: {}", self.id, worker, err)
                    }
                }
            }
            if started == 0 && workers > 0 {
                self.work(&queue, total);
            }
        });

        self.finish(total)
    }

    fn validate(&self) -> Result<(), BatchError> {
        if self.options.concurrency == 0 {
            return Err(BatchError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.options.retry.max_attempts == 0 {
            return Err(BatchError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn work(&self, queue: &Mutex<VecDeque<(usize, String)>>, total: u64) {
        let mut first = true;
        loop {
            if self.is_cancelled() {
                return;
            }
            let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some((index, url)) = next else {
                return;
            };
            if !first {
                thread::sleep(self.options.per_item_delay);
                if self.is_cancelled() {
                    return;
                }
            }
            first = false;

            let outcome = self.pipeline.run(index, &url);
            let counter = if outcome.is_success() {
                Counter::Successful
            } else {
                Counter::Failed
            };
            self.progress.increment_counter(self.id, counter);
            if self.progress.increment_counter(self.id, Counter::Processed) == Some(total) {
                self.complete("batch completed");
            }
        }
    }

    fn finish(&self, total: u64) -> Result<BatchState, BatchError> {
        let state = self
            .progress
            .read_batch(self.id)
            .ok_or(BatchError::BatchNotFound(self.id))?;
        if state.status.is_terminal() {
            return Ok(state);
        }
        if self.is_cancelled() && !state.is_drained() {
            self.complete(&format!(
                "batch cancelled after {} of {} urls",
                state.processed, total
            ));
        } else {
            self.complete("batch completed");
        }
        self.progress
            .read_batch(self.id)
            .ok_or(BatchError::BatchNotFound(self.id))
    }

    fn complete(&self, message: &str) {
        self.progress.update_batch_status(self.id, BatchStatus::Completed);
        if let Some(state) = self.progress.read_batch(self.id) {
            let summary = format!(
                "{message}: {} succeeded, {} failed",
                state.successful, state.failed
            );
            self.progress.append_activity(self.id, summary.clone());
            engine_info!("batch {} {}", self.id, summary);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}
