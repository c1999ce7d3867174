use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use engine_logging::{engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use shorts_core::ComposeSettings;
use shorts_engine::{AtomicFileWriter, BatchOptions, RetryPolicy, StageTimeouts, StyleOptions};

/// External program plus the arguments placed before the request file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CommandSpec {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub(crate) enum ScriptLanguage {
    #[default]
    English,
    Korean,
}

/// Settings read from the RON config file. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub concurrency: usize,
    pub delay_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub fetch_timeout_secs: u64,
    pub render_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    /// Render requests, videos and publish metadata go under here.
    pub output_dir: PathBuf,
    /// Extracted records are kept in memory when unset.
    pub records_dir: Option<PathBuf>,
    pub renderer: CommandSpec,
    pub publisher: CommandSpec,
    pub language: ScriptLanguage,
    pub style: StyleOptions,
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let options = BatchOptions::default();
        Self {
            concurrency: options.concurrency,
            delay_secs: options.per_item_delay.as_secs(),
            max_attempts: options.retry.max_attempts,
            initial_backoff_secs: options.retry.initial_backoff.as_secs(),
            max_backoff_secs: options.retry.max_backoff.as_secs(),
            fetch_timeout_secs: options.timeouts.fetch.as_secs(),
            render_timeout_secs: options.timeouts.render.as_secs(),
            publish_timeout_secs: options.timeouts.publish.as_secs(),
            output_dir: PathBuf::from("output"),
            records_dir: None,
            renderer: CommandSpec {
                program: PathBuf::from("shorts-render"),
                args: Vec::new(),
            },
            publisher: CommandSpec {
                program: PathBuf::from("shorts-publish"),
                args: Vec::new(),
            },
            language: ScriptLanguage::English,
            style: options.style,
            poll_interval_ms: 500,
        }
    }
}

/// Extra time the pipeline waits past a command deadline, so the command
/// is killed and reaped before its stage gives up on it.
const KILL_GRACE: Duration = Duration::from_secs(5);

impl AppConfig {
    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            per_item_delay: Duration::from_secs(self.delay_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_backoff: Duration::from_secs(self.initial_backoff_secs),
                max_backoff: Duration::from_secs(self.max_backoff_secs),
                ..RetryPolicy::default()
            },
            timeouts: StageTimeouts {
                fetch: Duration::from_secs(self.fetch_timeout_secs),
                render: self.render_timeout() + KILL_GRACE,
                publish: self.publish_timeout() + KILL_GRACE,
            },
            style: self.style.clone(),
        }
    }

    /// Deadline after which the renderer command is killed.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    /// Deadline after which the publisher command is killed.
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn compose_settings(&self) -> ComposeSettings {
        match self.language {
            ScriptLanguage::English => ComposeSettings::default(),
            ScriptLanguage::Korean => ComposeSettings::korean(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }
}

/// Read `path` as RON. A missing file yields the defaults.
pub(crate) fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            engine_warn!("Config {:?} not found, using defaults", path);
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading config {}", path.display()));
        }
    };

    let config: AppConfig =
        ron::from_str(&content).with_context(|| format!("parsing config {}", path.display()))?;
    engine_info!("Loaded config from {:?}", path);
    Ok(config)
}

/// Write `config` as pretty RON, replacing any existing file atomically.
pub(crate) fn save(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    let content = ron::ser::to_string_pretty(config, ron::ser::PrettyConfig::new())
        .context("serializing config")?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("config path {} has no file name", path.display()))?;
    AtomicFileWriter::new(dir.to_path_buf()).write(filename, content.as_bytes())?;
    engine_info!("Wrote config to {:?}", path);
    Ok(())
}
