//! Sermon shorts engine: fetching, progress bookkeeping, per-item pipeline
//! and batch orchestration.
mod collab;
mod command;
mod decode;
mod fetch;
mod filename;
mod orchestrator;
mod persist;
mod pipeline;
mod progress;
mod publish;
mod records;
mod render;
mod retry;
mod timeout;
mod types;

pub use collab::{CollabError, Publisher, RecordStore, Renderer, StoreError, StyleOptions};
pub use decode::{decode_html, DecodeError, DecodedHtml};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::deterministic_filename;
pub use orchestrator::{BatchError, BatchHandle, BatchOptions, BatchOrchestrator};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use pipeline::{Collaborators, ItemPipeline, StageTimeouts};
pub use progress::{Clock, ProgressSnapshot, ProgressStore, StoreSettings};
pub use publish::CommandPublisher;
pub use records::{JsonDirRecordStore, MemoryRecordStore};
pub use render::CommandRenderer;
pub use retry::RetryPolicy;
pub use timeout::{call_with_timeout, CallError};
pub use types::{
    BatchId, FailureKind, FetchError, FetchMetadata, FetchOutput, ItemOutcome, ItemReport,
    PublishedRef, RecordId,
};
