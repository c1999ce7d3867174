use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shorts_core::{ContentRecord, ErrorClass, PublishMetadata, Script};
use thiserror::Error;

use crate::{PersistError, PublishedRef, RecordId};

/// Failure reported by a renderer or publisher.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollabError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("authorization required: {0}")]
    AuthRequired(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl CollabError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CollabError::Timeout(_) | CollabError::Transient(_) => ErrorClass::Transient,
            CollabError::AuthRequired(_) | CollabError::Rejected(_) => ErrorClass::Permanent,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    #[error("record rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl StoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::Unavailable(_) => ErrorClass::Transient,
            StoreError::Rejected(_) | StoreError::Persist(_) => ErrorClass::Permanent,
        }
    }
}

/// Visual parameters handed to the renderer alongside the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOptions {
    pub theme: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub font: String,
    pub text_color: String,
    pub language: String,
    pub background: Option<PathBuf>,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            theme: "peaceful_blue".to_string(),
            width: 1080,
            height: 1920,
            fps: 30,
            font: "Arial".to_string(),
            text_color: "white".to_string(),
            language: "ko".to_string(),
            background: None,
        }
    }
}

pub trait Renderer: Send + Sync {
    /// Produce a video for `script` and return its path. May take minutes.
    fn render(&self, script: &Script, style: &StyleOptions) -> Result<PathBuf, CollabError>;
}

pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        artifact: &Path,
        metadata: &PublishMetadata,
    ) -> Result<PublishedRef, CollabError>;
}

/// Plain insert of extracted records; no dedup.
pub trait RecordStore: Send + Sync {
    fn save(&self, record: &ContentRecord) -> Result<RecordId, StoreError>;
}
