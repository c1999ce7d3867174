//! Command-line front end: reads sermon URLs, runs one batch and reports
//! progress until it finishes.

mod config;
mod report;

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use engine_logging::{engine_info, engine_warn, LogDestination};
use log::LevelFilter;
use shorts_core::{parse_url_list, partition_urls, ScriptComposer, SermonPageExtractor};
use shorts_engine::{
    BatchOrchestrator, Collaborators, CommandPublisher, CommandRenderer, FetchSettings,
    JsonDirRecordStore, MemoryRecordStore, ProgressStore, RecordStore, ReqwestFetcher,
};

use crate::config::{AppConfig, ScriptLanguage};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "sermon-shorts")]
#[command(about = "Turn sermon pages into short videos and publish them")]
struct Cli {
    /// File with one URL per line; reads stdin when omitted or "-"
    urls: Option<PathBuf>,

    /// RON config file
    #[arg(short, long, default_value = "shorts.ron")]
    config: PathBuf,

    /// Items processed at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Pause between items on the same worker, in seconds
    #[arg(long)]
    delay_secs: Option<u64>,

    /// Attempts per item, including the first
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Directory for render requests, videos and publish metadata
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Keep extracted records as JSON files in this directory
    #[arg(long)]
    records_dir: Option<PathBuf>,

    /// Compose scripts with Korean labels
    #[arg(long)]
    korean: bool,

    /// Write the effective config to this path and exit
    #[arg(long)]
    write_config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "terminal")]
    log: LogTarget,

    /// Log debug detail
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(delay) = self.delay_secs {
            config.delay_secs = delay;
        }
        if let Some(attempts) = self.max_attempts {
            config.max_attempts = attempts;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.records_dir {
            config.records_dir = Some(dir.clone());
        }
        if self.korean {
            config.language = ScriptLanguage::Korean;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(cli.log.into(), level);

    let mut config = config::load(&cli.config)?;
    cli.apply(&mut config);

    if let Some(path) = &cli.write_config {
        config::save(path, &config)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let raw = read_input(cli.urls.as_deref())?;
    let (urls, rejected) = partition_urls(parse_url_list(&raw));
    for (url, reason) in &rejected {
        engine_warn!("Skipping {}: {}", url, reason);
        eprintln!("skipping {url}: {reason}");
    }
    if urls.is_empty() {
        anyhow::bail!("no valid URLs to process");
    }

    let progress = Arc::new(ProgressStore::default());
    let orchestrator = BatchOrchestrator::new(build_collaborators(&config)?, progress.clone())
        .with_composer(ScriptComposer::new(config.compose_settings()));

    engine_info!("Submitting {} urls", urls.len());
    let handle = orchestrator.submit(urls, config.batch_options())?;
    println!("batch {} submitted", handle.id());

    let id = handle.id();
    let state = report::watch(&progress, handle, config.poll_interval())?;
    report::print_summary(&state, &progress.read_items(id));
    Ok(())
}

fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("reading url list {}", path.display())),
        _ => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .context("reading url list from stdin")?;
            Ok(raw)
        }
    }
}

fn build_collaborators(config: &AppConfig) -> anyhow::Result<Collaborators> {
    let fetcher = ReqwestFetcher::new(FetchSettings::default()).context("starting fetch runtime")?;
    let records: Arc<dyn RecordStore> = match &config.records_dir {
        Some(dir) => Arc::new(JsonDirRecordStore::new(dir.clone())),
        None => Arc::new(MemoryRecordStore::new()),
    };
    let renderer = CommandRenderer::new(
        config.renderer.program.clone(),
        config.output_dir.join("requests"),
        config.output_dir.join("videos"),
    )
    .with_args(config.renderer.args.clone())
    .with_timeout(config.render_timeout());
    let publisher = CommandPublisher::new(
        config.publisher.program.clone(),
        config.output_dir.join("publish"),
    )
    .with_args(config.publisher.args.clone())
    .with_timeout(config.publish_timeout());

    Ok(Collaborators {
        fetcher: Arc::new(fetcher),
        extractor: Arc::new(SermonPageExtractor),
        records,
        renderer: Arc::new(renderer),
        publisher: Arc::new(publisher),
    })
}
