mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use shorts_core::{ErrorClass, ItemStage, ScriptComposer};
use shorts_engine::{
    CollabError, FailureKind, ItemPipeline, ProgressStore, RetryPolicy, StageTimeouts,
};
use support::{FakePublisher, FakeRenderer, Fakes, ScriptedFetcher};

const URL: &str = "https://grace.org/sermons/1";
const BATCH: u64 = 1;

fn pipeline(fakes: &Fakes, progress: &Arc<ProgressStore>) -> ItemPipeline {
    progress.create_batch(BATCH, 1);
    ItemPipeline::new(
        BATCH,
        fakes.collaborators(),
        ScriptComposer::default(),
        progress.clone(),
    )
    .with_retry(RetryPolicy::no_retry())
}

fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(5),
        multiplier: 2,
        max_backoff: Duration::from_millis(20),
    }
}

#[test]
fn successful_item_walks_every_stage() {
    engine_logging::initialize_for_tests();
    let fakes = Fakes::new(ScriptedFetcher::new().page(URL, "The Good Shepherd"));
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).run(0, URL);

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.record_id.as_deref(), Some("record-1"));
    assert_eq!(outcome.published.as_ref().unwrap().id, "vid1");
    assert_eq!(outcome.attempts, 1);

    let rendered = fakes.renderer.rendered.lock().unwrap().clone();
    assert!(rendered[0].starts_with("Title: The Good Shepherd"));
    let published = fakes.publisher.published.lock().unwrap().clone();
    assert_eq!(published[0].1.title, "The Good Shepherd");

    let messages: Vec<_> = progress
        .read_activity(BATCH)
        .into_iter()
        .rev()
        .map(|entry| entry.message)
        .collect();
    assert_eq!(messages.len(), 7);
    assert!(messages[0].starts_with("fetching"));
    assert!(messages[6].starts_with("published"));

    let items = progress.read_items(BATCH);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].outcome, outcome);
}

#[test]
fn page_without_content_fails_validation_at_extract() {
    let fetcher = ScriptedFetcher::new().respond(
        URL,
        Ok(support::html_output(URL, "<html><body><p>hi</p></body></html>")),
    );
    let fakes = Fakes::new(fetcher);
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).run(0, URL);

    assert_eq!(outcome.status, ItemStage::Failed);
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage, ItemStage::Extracting);
    assert_eq!(failure.class, ErrorClass::Validation);
    assert!(fakes.records.is_empty());
}

#[test]
fn render_failure_keeps_the_saved_record() {
    let fakes = Fakes::with(
        ScriptedFetcher::new().page(URL, "The Good Shepherd"),
        FakeRenderer::failing(CollabError::Rejected("bad font".to_string())),
        FakePublisher::ok(),
    );
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).run(0, URL);

    assert_eq!(outcome.failed_stage(), Some(ItemStage::Rendering));
    assert_eq!(outcome.record_id.as_deref(), Some("record-1"));
    let script = outcome.script.as_ref().unwrap();
    assert!(script.text().starts_with("Title: The Good Shepherd"));
    assert_eq!(outcome.artifact, None);
    assert_eq!(fakes.records.len(), 1);
}

#[test]
fn publish_failure_is_rendered_but_unpublished() {
    let fakes = Fakes::with(
        ScriptedFetcher::new().page(URL, "The Good Shepherd"),
        FakeRenderer::ok(),
        FakePublisher::failing(CollabError::AuthRequired("login".to_string())),
    );
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).with_retry(quick_retry(3)).run(0, URL);

    assert!(outcome.is_rendered_unpublished());
    assert_eq!(outcome.failed_stage(), Some(ItemStage::Publishing));
    assert_eq!(outcome.failure.unwrap().class, ErrorClass::Permanent);
    assert_eq!(outcome.attempts, 1, "auth failures are not retried");
}

#[test]
fn slow_render_times_out_as_transient() {
    let fakes = Fakes::with(
        ScriptedFetcher::new().page(URL, "The Good Shepherd"),
        FakeRenderer::slow(Duration::from_millis(500)),
        FakePublisher::ok(),
    );
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress)
        .with_timeouts(StageTimeouts {
            render: Duration::from_millis(30),
            ..StageTimeouts::default()
        })
        .run(0, URL);

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage, ItemStage::Rendering);
    assert_eq!(failure.class, ErrorClass::Transient);
    assert!(failure.message.contains("timed out"), "{}", failure.message);
}

#[test]
fn transient_fetch_failure_is_retried_until_success() {
    let fetcher = ScriptedFetcher::new()
        .failing(URL, FailureKind::HttpStatus(503))
        .failing(URL, FailureKind::Timeout)
        .page(URL, "The Good Shepherd");
    let fakes = Fakes::new(fetcher);
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).with_retry(quick_retry(3)).run(0, URL);

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.attempts, 3);
    assert_eq!(fakes.fetcher.calls(URL), 3);
    let retries = progress
        .read_activity(BATCH)
        .iter()
        .filter(|entry| entry.message.starts_with("retrying"))
        .count();
    assert_eq!(retries, 2);
}

#[test]
fn retries_stop_at_max_attempts() {
    let fakes = Fakes::new(ScriptedFetcher::new().failing(URL, FailureKind::Network));
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).with_retry(quick_retry(2)).run(0, URL);

    assert_eq!(outcome.failed_stage(), Some(ItemStage::Fetching));
    assert_eq!(outcome.attempts, 2);
    assert_eq!(fakes.fetcher.calls(URL), 2);
}

#[test]
fn permanent_fetch_failure_is_not_retried() {
    let fakes = Fakes::new(ScriptedFetcher::new());
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).with_retry(quick_retry(3)).run(0, URL);

    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage, ItemStage::Fetching);
    assert_eq!(failure.class, ErrorClass::Permanent);
    assert_eq!(fakes.fetcher.calls(URL), 1);
}

#[test]
fn publish_timeout_is_not_retried() {
    let fakes = Fakes::with(
        ScriptedFetcher::new().page(URL, "The Good Shepherd"),
        FakeRenderer::ok(),
        FakePublisher::slow(Duration::from_millis(150)),
    );
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress)
        .with_retry(quick_retry(3))
        .with_timeouts(StageTimeouts {
            publish: Duration::from_millis(30),
            ..StageTimeouts::default()
        })
        .run(0, URL);

    assert!(outcome.is_rendered_unpublished(), "{outcome:?}");
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.stage, ItemStage::Publishing);
    assert_eq!(failure.class, ErrorClass::Permanent);
    assert!(failure.message.contains("upload state unknown"), "{}", failure.message);
    assert_eq!(outcome.attempts, 1);

    std::thread::sleep(Duration::from_millis(400));
    assert_eq!(fakes.publisher.uploads(), 1, "only the abandoned upload ran");
}

#[test]
fn retries_reuse_the_saved_record() {
    let fakes = Fakes::with(
        ScriptedFetcher::new().page(URL, "The Good Shepherd"),
        FakeRenderer::failing(CollabError::Transient("encoder busy".to_string())),
        FakePublisher::ok(),
    );
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).with_retry(quick_retry(3)).run(0, URL);

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.failed_stage(), Some(ItemStage::Rendering));
    assert_eq!(fakes.records.len(), 1);
    assert_eq!(fakes.fetcher.calls(URL), 1);
    assert_eq!(outcome.record_id.as_deref(), Some("record-1"));
    assert_eq!(outcome.retried_failures.len(), 2);
    assert!(outcome
        .retried_failures
        .iter()
        .all(|failure| failure.stage == ItemStage::Rendering));

    let items = progress.read_items(BATCH);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].outcome.retried_failures, outcome.retried_failures);
}

#[test]
fn publish_retry_reuses_the_rendered_video() {
    let fakes = Fakes::with(
        ScriptedFetcher::new().page(URL, "The Good Shepherd"),
        FakeRenderer::ok(),
        FakePublisher::failing(CollabError::Transient("quota window".to_string())),
    );
    let progress = Arc::new(ProgressStore::default());

    let outcome = pipeline(&fakes, &progress).with_retry(quick_retry(2)).run(0, URL);

    assert_eq!(outcome.attempts, 2);
    assert!(outcome.is_rendered_unpublished());
    assert_eq!(fakes.renderer.rendered.lock().unwrap().len(), 1);
    assert_eq!(
        outcome.artifact.as_deref(),
        Some(std::path::Path::new("/videos/video-1.mp4"))
    );
}
