use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use shorts_core::{
    ContentRecord, ErrorClass, Extractor, ItemStage, ItemState, PublishMetadata, Script,
    ScriptComposer,
};

use crate::{
    call_with_timeout, BatchId, CallError, CollabError, DecodedHtml, FetchOutput, Fetcher,
    ItemOutcome, ItemReport, ProgressStore, PublishedRef, Publisher, RecordStore, Renderer,
    RecordId, RetryPolicy, StyleOptions,
};

/// Upper bounds on each external call.
///
/// An exceeded fetch or render fails the stage as transient. An exceeded
/// publish fails it as permanent, since the upload may have gone through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageTimeouts {
    pub fetch: Duration,
    pub render: Duration,
    pub publish: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(40),
            render: Duration::from_secs(10 * 60),
            publish: Duration::from_secs(5 * 60),
        }
    }
}

/// External collaborators an item passes through.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub records: Arc<dyn RecordStore>,
    pub renderer: Arc<dyn Renderer>,
    pub publisher: Arc<dyn Publisher>,
}

struct StageError {
    class: ErrorClass,
    message: String,
}

impl StageError {
    fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }

    fn from_call(err: CallError) -> Self {
        let class = match err {
            CallError::TimedOut(_) | CallError::Spawn(_) => ErrorClass::Transient,
            CallError::Panicked => ErrorClass::Permanent,
        };
        Self::new(class, err.to_string())
    }

    fn from_collab(err: CollabError) -> Self {
        Self::new(err.class(), err.to_string())
    }

    fn unconfirmed_upload(after: Duration) -> Self {
        Self::new(
            ErrorClass::Permanent,
            format!("publish timed out after {after:?}; upload state unknown, not retried"),
        )
    }
}

/// Work finished by an earlier attempt. Retries pick up from here instead of
/// saving the record or rendering the video again.
#[derive(Default)]
struct Carried {
    record: Option<(ContentRecord, RecordId)>,
    artifact: Option<PathBuf>,
}

/// Drives one URL through fetch, extract, persist, compose, render and publish.
///
/// Every collaborator failure is caught at its stage and turned into a
/// `Failed` outcome; `run` itself never returns an error. Stage transitions
/// are reported as activity on the owning batch.
pub struct ItemPipeline {
    batch_id: BatchId,
    collaborators: Collaborators,
    composer: ScriptComposer,
    style: StyleOptions,
    timeouts: StageTimeouts,
    retry: RetryPolicy,
    progress: Arc<ProgressStore>,
}

impl ItemPipeline {
    pub fn new(
        batch_id: BatchId,
        collaborators: Collaborators,
        composer: ScriptComposer,
        progress: Arc<ProgressStore>,
    ) -> Self {
        Self {
            batch_id,
            collaborators,
            composer,
            style: StyleOptions::default(),
            timeouts: StageTimeouts::default(),
            retry: RetryPolicy::default(),
            progress,
        }
    }

    pub fn with_style(mut self, style: StyleOptions) -> Self {
        self.style = style;
        self
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Process the item at `index`, retrying transient failures, and record
    /// its final report.
    ///
    /// A retry resumes after the last finished stage: the record is saved
    /// once per item and a rendered video is published rather than rendered
    /// again.
    pub fn run(&self, index: usize, url: &str) -> ItemOutcome {
        let mut carried = Carried::default();
        let mut retried_failures = Vec::new();
        let mut attempt = 1;
        loop {
            let mut outcome = self.run_once(url, &mut carried);
            outcome.attempts = attempt;

            let retry_after = outcome
                .failure
                .as_ref()
                .filter(|failure| self.retry.should_retry(attempt, failure))
                .map(|_| self.retry.backoff(attempt));

            match (retry_after, outcome.failure) {
                (Some(wait), Some(failure)) => {
                    self.activity(format!(
                        "retrying {url} in {}s (attempt {} of {})",
                        wait.as_secs(),
                        attempt + 1,
                        self.retry.max_attempts
                    ));
                    engine_info!(
                        "batch {} item {} retry {} after {:?}",
                        self.batch_id,
                        index,
                        attempt + 1,
                        wait
                    );
                    retried_failures.push(failure);
                    thread::sleep(wait);
                    attempt += 1;
                }
                (_, failure) => {
                    outcome.failure = failure;
                    outcome.retried_failures = retried_failures;
                    self.progress.record_item(
                        self.batch_id,
                        ItemReport {
                            index,
                            outcome: outcome.clone(),
                        },
                    );
                    return outcome;
                }
            }
        }
    }

    fn run_once(&self, url: &str, carried: &mut Carried) -> ItemOutcome {
        let mut state = ItemState::new(url, self.progress.now());
        let mut outcome = ItemOutcome {
            url: url.to_string(),
            status: ItemStage::Pending,
            failure: None,
            record_id: None,
            script: None,
            artifact: None,
            published: None,
            attempts: 0,
            retried_failures: Vec::new(),
        };

        if let Err(err) = self.drive(&mut state, &mut outcome, carried) {
            let stage = state.stage();
            state.fail(err.class, err.message.clone(), self.progress.now());
            self.activity(format!("{stage} failed for {url}: {}", err.message));
            engine_warn!(
                "batch {} {} failed at {}: {}",
                self.batch_id,
                url,
                stage,
                err.message
            );
        }

        outcome.status = state.stage();
        outcome.failure = state.failure().cloned();
        outcome
    }

    fn drive(
        &self,
        state: &mut ItemState,
        outcome: &mut ItemOutcome,
        carried: &mut Carried,
    ) -> Result<(), StageError> {
        let url = state.url().to_string();

        let (record, record_id) = match &carried.record {
            Some((record, record_id)) => {
                self.enter(
                    state,
                    ItemStage::Persisting,
                    format!("reusing record {record_id} for {url}"),
                );
                (record.clone(), record_id.clone())
            }
            None => {
                let saved = self.collect(state, &url)?;
                carried.record = Some(saved.clone());
                saved
            }
        };
        outcome.record_id = Some(record_id);

        self.enter(state, ItemStage::Composing, format!("composing script for {url}"));
        let script = self.composer.compose(&record);
        outcome.script = Some(script.clone());

        let artifact = match &carried.artifact {
            Some(artifact) => {
                self.enter(
                    state,
                    ItemStage::Rendering,
                    format!("reusing video {} for {url}", artifact.display()),
                );
                artifact.clone()
            }
            None => {
                self.enter(
                    state,
                    ItemStage::Rendering,
                    format!("rendering {} chars for {url}", script.char_len()),
                );
                let artifact = self.render(script)?;
                carried.artifact = Some(artifact.clone());
                artifact
            }
        };
        outcome.artifact = Some(artifact.clone());

        self.enter(state, ItemStage::Publishing, format!("publishing {url}"));
        let published = self.publish(artifact, PublishMetadata::from_record(&record))?;

        self.enter(
            state,
            ItemStage::Succeeded,
            format!("published {url} as {}", published.url),
        );
        outcome.published = Some(published);
        Ok(())
    }

    /// Fetch, extract and save the page, leaving the state in `Persisting`.
    fn collect(
        &self,
        state: &mut ItemState,
        url: &str,
    ) -> Result<(ContentRecord, RecordId), StageError> {
        self.enter(state, ItemStage::Fetching, format!("fetching {url}"));
        let fetched = self.fetch(url)?;

        self.enter(state, ItemStage::Extracting, format!("extracting {url}"));
        let decoded = DecodedHtml::from_fetch(&fetched)
            .map_err(|err| StageError::new(ErrorClass::Validation, err.to_string()))?;
        let record = self
            .collaborators
            .extractor
            .extract(&decoded.html, url)
            .ok_or_else(|| StageError::new(ErrorClass::Validation, "no usable title or body"))?;

        self.enter(
            state,
            ItemStage::Persisting,
            format!("extracted \"{}\"", record.title()),
        );
        let record_id = self
            .collaborators
            .records
            .save(&record)
            .map_err(|err| StageError::new(err.class(), err.to_string()))?;
        Ok((record, record_id))
    }

    fn fetch(&self, url: &str) -> Result<FetchOutput, StageError> {
        let fetcher = Arc::clone(&self.collaborators.fetcher);
        let owned = url.to_string();
        call_with_timeout("fetch", self.timeouts.fetch, move || fetcher.fetch(&owned))
            .map_err(StageError::from_call)?
            .map_err(|err| StageError::new(err.class(), err.to_string()))
    }

    fn render(&self, script: Script) -> Result<PathBuf, StageError> {
        let renderer = Arc::clone(&self.collaborators.renderer);
        let style = self.style.clone();
        call_with_timeout("render", self.timeouts.render, move || {
            renderer.render(&script, &style)
        })
        .map_err(StageError::from_call)?
        .map_err(StageError::from_collab)
    }

    fn publish(
        &self,
        artifact: PathBuf,
        metadata: PublishMetadata,
    ) -> Result<PublishedRef, StageError> {
        let publisher = Arc::clone(&self.collaborators.publisher);
        let published = call_with_timeout("publish", self.timeouts.publish, move || {
            publisher.publish(&artifact, &metadata)
        });
        match published {
            Ok(Ok(published)) => Ok(published),
            Err(CallError::TimedOut(after)) | Ok(Err(CollabError::Timeout(after))) => {
                Err(StageError::unconfirmed_upload(after))
            }
            Err(err) => Err(StageError::from_call(err)),
            Ok(Err(err)) => Err(StageError::from_collab(err)),
        }
    }

    fn enter(&self, state: &mut ItemState, stage: ItemStage, message: String) {
        state.advance(stage, self.progress.now());
        engine_debug!("batch {} {}", self.batch_id, message);
        self.activity(message);
    }

    fn activity(&self, message: String) {
        self.progress.append_activity(self.batch_id, message);
    }
}
