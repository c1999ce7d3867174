//! Sermon shorts core: pure extraction, script composition and state types.
mod compose;
mod extract;
mod host;
mod intake;
mod metadata;
mod record;
mod reference;
mod script;
mod state;
mod text;

pub use compose::{ComposeSettings, ScriptComposer, ScriptLabels};
pub use extract::{Extractor, SermonPageExtractor};
pub use host::organization_from_host;
pub use intake::{parse_url_list, partition_urls, validate_source_url, UrlRejection};
pub use metadata::PublishMetadata;
pub use record::ContentRecord;
pub use reference::{find_reference, looks_like_reference};
pub use script::{truncate_chars, Script, SCRIPT_CHAR_CAP};
pub use state::{
    ActivityEntry, BatchState, BatchStatus, Counter, ErrorClass, ItemStage, ItemState,
    StageFailure,
};
