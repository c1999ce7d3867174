use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shorts_core::{ErrorClass, ItemStage, Script, StageFailure};

pub type BatchId = u64;
pub type RecordId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl FailureKind {
    /// Timeouts, connection errors, 5xx, 408 and 429 are worth another attempt.
    pub fn class(&self) -> ErrorClass {
        match self {
            FailureKind::Timeout | FailureKind::Network => ErrorClass::Transient,
            FailureKind::HttpStatus(code) if *code >= 500 || *code == 408 || *code == 429 => {
                ErrorClass::Transient
            }
            _ => ErrorClass::Permanent,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedRef {
    pub id: String,
    pub url: String,
}

/// Terminal result of one item's pipeline run.
///
/// Everything produced before a failure is kept: a render failure still
/// carries its `record_id` and `script`, a publish failure its `artifact`.
/// Failures of attempts that were retried are kept in `retried_failures`,
/// oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub url: String,
    pub status: ItemStage,
    pub failure: Option<StageFailure>,
    pub record_id: Option<RecordId>,
    pub script: Option<Script>,
    pub artifact: Option<PathBuf>,
    pub published: Option<PublishedRef>,
    pub attempts: u32,
    pub retried_failures: Vec<StageFailure>,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ItemStage::Succeeded
    }

    /// Rendered but not published: a valid terminal state distinct from success.
    pub fn is_rendered_unpublished(&self) -> bool {
        self.status == ItemStage::Failed && self.artifact.is_some() && self.published.is_none()
    }

    pub fn failed_stage(&self) -> Option<ItemStage> {
        self.failure.as_ref().map(|f| f.stage)
    }
}

/// Retained per-item detail for a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub index: usize,
    pub outcome: ItemOutcome,
}
