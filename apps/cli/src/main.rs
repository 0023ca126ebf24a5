//! resup: resumable chunked file uploader.
//!
//! Usage:
//!   resup <endpoint> <files>... [--config path] [--chunk-size n]
//!         [--max-requests n] [--param key=value]...
//!
//! Exit status is 0 when every file was uploaded, 1 when any file failed
//! and 130 when interrupted. An interrupted upload resumes on the next run.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use resup_http::HttpTransport;
use resup_transfer::{FileHandle, LocalFile};
use resup_uploader::{FileInfo, UploadEvent, Uploader, UploaderConfig};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(name = "resup", version, about = "Resumable chunked file uploader")]
struct Cli {
    /// Upload endpoint URL
    endpoint: String,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Path to a TOML configuration file
    #[arg(long, short = 'c', env = "RESUP_CONFIG")]
    config: Option<PathBuf>,

    /// Chunk size in bytes
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Maximum concurrent requests
    #[arg(long)]
    max_requests: Option<usize>,

    /// Extra parameter sent with every request (repeatable)
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, config: &mut UploaderConfig) {
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(max_requests) = self.max_requests {
            config.max_requests = max_requests;
        }
        for (key, value) in &self.params {
            config.query.insert(key.clone(), value.clone());
        }
    }
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

/// How the event loop finished.
enum Outcome {
    Ended {
        completed: Vec<FileInfo>,
        failed: Vec<FileInfo>,
    },
    Interrupted,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = CliConfig::load(cli.config.as_deref())?.upload;
    cli.apply(&mut config);

    let transport = Arc::new(HttpTransport::new()?);
    let uploader = Uploader::builder(&cli.endpoint, transport)
        .config(config)
        .build()?;
    let mut events = uploader.events();

    let mut handles: Vec<Arc<dyn FileHandle>> = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let file = LocalFile::open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        handles.push(Arc::new(file));
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %cli.endpoint,
        files = handles.len(),
        "starting upload"
    );

    if uploader.add(handles).is_empty() {
        while let Ok(event) = events.try_recv() {
            log_event(&event);
        }
        error!("no files to upload");
        return Ok(ExitCode::FAILURE);
    }
    uploader.start();

    match drive(&uploader, &mut events).await? {
        Outcome::Ended { completed, failed } => {
            for file in &completed {
                info!(file = %file.name, size = file.size, "uploaded");
            }
            for file in &failed {
                error!(
                    file = %file.name,
                    uploaded = file.uploaded_chunks,
                    total = file.total_chunks,
                    "upload failed"
                );
            }
            if failed.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Outcome::Interrupted => {
            warn!("interrupted, run again to resume");
            Ok(ExitCode::from(130))
        }
    }
}

/// Logs events and periodic progress until the session ends or Ctrl-C.
async fn drive(
    uploader: &Uploader,
    events: &mut mpsc::UnboundedReceiver<UploadEvent>,
) -> Result<Outcome> {
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(UploadEvent::SessionEnded { completed, failed }) => {
                    return Ok(Outcome::Ended { completed, failed });
                }
                Some(event) => log_event(&event),
                None => anyhow::bail!("event stream closed"),
            },
            _ = ticker.tick() => log_progress(uploader),
            result = tokio::signal::ctrl_c() => {
                result.context("listening for Ctrl-C")?;
                uploader.stop();
                return Ok(Outcome::Interrupted);
            }
        }
    }
}

fn log_event(event: &UploadEvent) {
    match event {
        UploadEvent::FilesAdded { accepted, rejected } => {
            info!(accepted = accepted.len(), skipped = rejected, "files added");
        }
        UploadEvent::FileRejected { file, reason } => {
            warn!(file = %file.name, size = file.size, %reason, "file rejected");
        }
        UploadEvent::FileError { file } => {
            error!(file = %file.name, retries = file.retries, "giving up on file");
        }
        UploadEvent::Progress { .. } | UploadEvent::SessionEnded { .. } => {}
    }
}

fn log_progress(uploader: &Uploader) {
    let percent = uploader.progress() * 100.0;
    match uploader.seconds_remaining() {
        -1 => info!("{percent:.1}%"),
        secs => info!("{percent:.1}%, {} remaining", format_eta(secs)),
    }
}

fn format_eta(secs: i64) -> String {
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}
