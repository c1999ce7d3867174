use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, Response};

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    /// Pages larger than this are rejected, whether declared or streamed.
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            user_agent: concat!("sermon-shorts/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_language: "ko,en;q=0.8".to_string(),
        }
    }
}

/// Blocking page fetch. Workers call this directly and are occupied until it returns.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

/// reqwest-backed fetcher driving its async client on an owned runtime.
///
/// `fetch` blocks the calling thread and must not be called from inside
/// another tokio runtime.
#[derive(Debug)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    runtime: tokio::runtime::Runtime,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("shorts-fetch")
            .enable_all()
            .build()?;
        Ok(Self { settings, runtime })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// A client per request so the redirect count belongs to this fetch only.
    fn client(&self, redirects_seen: Arc<AtomicUsize>) -> Result<Client, FetchError> {
        let limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let hops = attempt.previous().len();
            redirects_seen.store(hops, Ordering::Relaxed);
            if hops < limit {
                attempt.follow()
            } else {
                attempt.error("redirect limit exceeded")
            }
        });

        Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .user_agent(self.settings.user_agent.clone())
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    fn accepts(&self, content_type: &str) -> bool {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(media_type))
    }

    async fn fetch_page(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let target = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let redirects_seen = Arc::new(AtomicUsize::new(0));

        let response = self
            .client(Arc::clone(&redirects_seen))?
            .get(target)
            .header(ACCEPT_LANGUAGE, self.settings.accept_language.as_str())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(declared) = response.content_length().filter(|len| *len > max_bytes) {
            return Err(too_large(max_bytes, declared));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = content_type.as_deref().filter(|ct| !self.accepts(ct)) {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: content_type.to_string(),
                },
                "not an html page",
            ));
        }

        let final_url = response.url().to_string();
        let bytes = read_capped(response, max_bytes).await?;
        engine_debug!("fetched {} bytes from {}", bytes.len(), final_url);

        Ok(FetchOutput {
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count: redirects_seen.load(Ordering::Relaxed),
                content_type,
                byte_len: bytes.len() as u64,
            },
            bytes,
        })
    }
}

impl Fetcher for ReqwestFetcher {
    fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        self.runtime.block_on(self.fetch_page(url))
    }
}

/// Stream the body, failing as soon as it grows past `max_bytes`.
async fn read_capped(response: Response, max_bytes: u64) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(classify_reqwest_error)?;
        let grown = (body.len() + chunk.len()) as u64;
        if grown > max_bytes {
            return Err(too_large(max_bytes, grown));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "page too large",
    )
}

fn classify_reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}
