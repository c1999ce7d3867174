#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use shorts_core::{PublishMetadata, Script, SermonPageExtractor};
use shorts_engine::{
    CollabError, Collaborators, FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher,
    MemoryRecordStore, PublishedRef, Publisher, Renderer, StyleOptions,
};

pub const BODY: &str = "Grace is not earned but received. We should pray for one another daily. \
    The apostle reminds the church that every good gift comes from above. \
    Remember to give thanks in all things.";

pub fn sermon_page(title: &str) -> String {
    format!(
        r#"<html><head><title>{title}</title></head><body>
        <h1 class="sermon-title">{title}</h1>
        <span class="pastor">Pastor Jane Kim</span>
        <span class="scripture">James 1:17</span>
        <div class="sermon-content"><p>{BODY}</p></div>
        </body></html>"#
    )
}

pub fn html_output(url: &str, html: &str) -> FetchOutput {
    FetchOutput {
        bytes: html.as_bytes().to_vec(),
        metadata: FetchMetadata {
            original_url: url.to_string(),
            final_url: url.to_string(),
            redirect_count: 0,
            content_type: Some("text/html; charset=utf-8".to_string()),
            byte_len: html.len() as u64,
        },
    }
}

type Scripted = Result<FetchOutput, FetchError>;

/// Serves canned responses per URL. Queued responses are consumed in order;
/// the last one repeats. Unknown URLs answer 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<String, usize>>,
    started: Mutex<Vec<Instant>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn page(self, url: &str, title: &str) -> Self {
        self.respond(url, Ok(html_output(url, &sermon_page(title))))
    }

    pub fn failing(self, url: &str, kind: FailureKind) -> Self {
        self.respond(url, Err(FetchError::new(kind, "scripted failure")))
    }

    pub fn respond(self, url: &str, response: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// When each fetch began, in call order.
    pub fn start_times(&self) -> Vec<Instant> {
        self.started.lock().unwrap().clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.started.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let response = {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => Err(FetchError::new(FailureKind::HttpStatus(404), "not found")),
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

pub struct FakeRenderer {
    failure: Option<CollabError>,
    delay: Duration,
    pub rendered: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn ok() -> Self {
        Self {
            failure: None,
            delay: Duration::ZERO,
            rendered: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CollabError) -> Self {
        Self {
            failure: Some(err),
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok()
        }
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, script: &Script, _style: &StyleOptions) -> Result<PathBuf, CollabError> {
        thread::sleep(self.delay);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut rendered = self.rendered.lock().unwrap();
        rendered.push(script.text().to_string());
        Ok(PathBuf::from(format!("/videos/video-{}.mp4", rendered.len())))
    }
}

pub struct FakePublisher {
    failure: Option<CollabError>,
    delay: Duration,
    pub published: Mutex<Vec<(PathBuf, PublishMetadata)>>,
}

impl FakePublisher {
    pub fn ok() -> Self {
        Self {
            failure: None,
            delay: Duration::ZERO,
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: CollabError) -> Self {
        Self {
            failure: Some(err),
            ..Self::ok()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok()
        }
    }

    pub fn uploads(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl Publisher for FakePublisher {
    fn publish(
        &self,
        artifact: &Path,
        metadata: &PublishMetadata,
    ) -> Result<PublishedRef, CollabError> {
        thread::sleep(self.delay);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let mut published = self.published.lock().unwrap();
        published.push((artifact.to_path_buf(), metadata.clone()));
        let id = format!("vid{}", published.len());
        Ok(PublishedRef {
            url: format!("https://videos.example/{id}"),
            id,
        })
    }
}

pub struct Fakes {
    pub fetcher: Arc<ScriptedFetcher>,
    pub records: Arc<MemoryRecordStore>,
    pub renderer: Arc<FakeRenderer>,
    pub publisher: Arc<FakePublisher>,
}

impl Fakes {
    pub fn new(fetcher: ScriptedFetcher) -> Self {
        Self::with(fetcher, FakeRenderer::ok(), FakePublisher::ok())
    }

    pub fn with(
        fetcher: ScriptedFetcher,
        renderer: FakeRenderer,
        publisher: FakePublisher,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            records: Arc::new(MemoryRecordStore::new()),
            renderer: Arc::new(renderer),
            publisher: Arc::new(publisher),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            fetcher: self.fetcher.clone(),
            extractor: Arc::new(SermonPageExtractor),
            records: self.records.clone(),
            renderer: self.renderer.clone(),
            publisher: self.publisher.clone(),
        }
    }
}
