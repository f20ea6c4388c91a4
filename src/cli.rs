use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use vibe_core::core::events::{
    BatchRunState, EventEmitter, QueueSnapshot, SingleDownloadInfo,
};
use vibe_core::models::job::{AudioQuality, JobId, JobMode, JobStatus};

use crate::commands::{self, downloads::DownloadRequest};
use crate::AppState;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QualityArg {
    Best,
    Standard,
    Low,
}

impl From<QualityArg> for AudioQuality {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Best => AudioQuality::Best,
            QualityArg::Standard => AudioQuality::Standard,
            QualityArg::Low => AudioQuality::Low,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    #[command(about = "Print metadata for a URL")]
    Info { url: String },
    #[command(about = "Download a single item")]
    Download {
        url: String,
        #[arg(short, long)]
        /// Extract audio as mp3 instead of downloading video
        audio: bool,
        #[arg(short, long, value_enum)]
        /// Audio quality tier
        quality: Option<QualityArg>,
        #[arg(short, long)]
        /// Video format id from `info`
        format: Option<String>,
        #[arg(long)]
        /// Sub-folder under the platform/content folder
        folder: Option<String>,
        #[arg(long)]
        /// Open the output folder when done
        reveal: bool,
    },
    #[command(about = "Download a list of URLs one after another")]
    Batch {
        /// File with one URL per line; read from stdin when omitted
        file: Option<PathBuf>,
        #[arg(short, long)]
        audio: bool,
    },
    #[command(about = "Manage per-platform cookie files")]
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
    #[command(about = "Show or change settings")]
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CookieAction {
    Save { platform: String, file: PathBuf },
    Status { platform: String },
    Delete { platform: String },
}

#[derive(Debug, Clone, Subcommand)]
pub enum SettingsAction {
    Show,
    SetPath { path: PathBuf },
    /// Merge a JSON object into the stored settings
    Set { json: String },
}

/// Prints queue transitions and interactive progress to the terminal.
#[derive(Default)]
pub struct ConsoleEmitter {
    last_statuses: Mutex<Vec<(JobId, JobStatus)>>,
}

impl EventEmitter for ConsoleEmitter {
    fn emit_queue_state(&self, snapshot: &QueueSnapshot) {
        let Ok(mut last) = self.last_statuses.lock() else {
            return;
        };
        for item in &snapshot.items {
            if last.contains(&(item.id, item.status)) {
                continue;
            }
            match &item.last_error {
                Some(err) if item.status == JobStatus::Failed => {
                    println!("[{}] {:?}: {} ({})", item.index + 1, item.status, item.title, err)
                }
                _ => println!("[{}] {:?}: {}", item.index + 1, item.status, item.title),
            }
        }
        *last = snapshot.items.iter().map(|i| (i.id, i.status)).collect();
    }

    fn emit_single_state(&self, state: &SingleDownloadInfo) {
        let mut err = std::io::stderr();
        if state.busy {
            let detail = state
                .status_text
                .clone()
                .or_else(|| {
                    state
                        .speed
                        .as_ref()
                        .map(|s| format!("{} ETA {}", s, state.eta.as_deref().unwrap_or("?")))
                })
                .unwrap_or_default();
            let _ = write!(err, "\r{:>5.1}% {:<40}", state.percent, detail);
        } else {
            let _ = writeln!(err);
        }
        let _ = err.flush();
    }
}

pub async fn execute(args: CliArgs, state: &AppState) -> anyhow::Result<()> {
    match args.action {
        Action::Info { url } => {
            let info = commands::downloads::get_media_info(state, &url)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Action::Download {
            url,
            audio,
            quality,
            format,
            folder,
            reveal,
        } => download(state, url, audio, quality, format, folder, reveal).await?,
        Action::Batch { file, audio } => batch(state, file, audio).await?,
        Action::Cookies { action } => cookies(state, action).await?,
        Action::Settings { action } => {
            let paths = state.paths.as_ref();
            let settings = match action {
                SettingsAction::Show => commands::settings::get_settings(paths),
                SettingsAction::SetPath { path } => {
                    commands::settings::set_download_path(paths, path).map_err(|e| anyhow!(e))?
                }
                SettingsAction::Set { json } => {
                    commands::settings::update_settings(paths, &json).map_err(|e| anyhow!(e))?
                }
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }
    Ok(())
}

async fn download(
    state: &AppState,
    url: String,
    audio: bool,
    quality: Option<QualityArg>,
    format: Option<String>,
    folder: Option<String>,
    reveal: bool,
) -> anyhow::Result<()> {
    let audio = audio || quality.is_some();
    let info = commands::downloads::get_media_info(state, &url)
        .await
        .map_err(|e| anyhow!(e))?;
    println!("{} ({})", info.title, info.uploader);

    let format_selector = match (audio, quality) {
        (true, Some(q)) => Some(AudioQuality::from(q).selector().to_string()),
        (true, None) => None,
        (false, _) => format,
    };
    let request = DownloadRequest {
        url,
        mode: if audio { JobMode::Audio } else { JobMode::Video },
        format_selector,
        title: Some(info.title),
        thumbnail_url: info.thumbnail,
        output_folder: folder,
    };

    commands::downloads::start_download(state, request)
        .await
        .map_err(|e| anyhow!(e))?;
    let done = state.single.wait_until_idle().await;

    if let Some(err) = done.error {
        bail!(err);
    }
    if let Some(path) = &done.last_output {
        println!("Saved to {}", path.display());
    }
    if reveal {
        commands::downloads::reveal_last_download(state)
            .await
            .map_err(|e| anyhow!(e))?;
    }
    Ok(())
}

async fn read_urls(file: Option<PathBuf>, lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>) -> anyhow::Result<String> {
    if let Some(file) = file {
        return tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()));
    }

    println!("Paste URLs, one per line; finish with an empty line:");
    let mut raw = String::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        raw.push_str(&line);
        raw.push('\n');
    }
    Ok(raw)
}

fn entry_index(arg: Option<&str>) -> Result<usize, String> {
    arg.and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .ok_or_else(|| "expected an item number starting at 1".to_string())
}

async fn handle_console_line(state: &AppState, line: &str) -> Result<(), String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Ok(());
    };

    match cmd {
        "pause" => {
            commands::batch::pause_batch(state).await;
        }
        "resume" => {
            commands::batch::resume_batch(state).await?;
        }
        "cancel" => {
            commands::batch::cancel_batch(state).await;
        }
        "retry" => {
            commands::batch::retry_batch_item(state, entry_index(parts.next())?).await?;
        }
        "remove" => {
            commands::batch::remove_batch_item(state, entry_index(parts.next())?).await?;
        }
        "mode" => {
            let index = entry_index(parts.next())?;
            let mode = match parts.next() {
                Some("audio") => JobMode::Audio,
                Some("video") => JobMode::Video,
                _ => return Err("usage: mode N audio|video".to_string()),
            };
            commands::batch::set_batch_item_mode(state, index, mode).await?;
        }
        "clear" => {
            commands::batch::clear_finished_batch(state).await;
        }
        "status" => {
            let snapshot = commands::batch::get_batch_state(state).await;
            println!("{:?}, cursor at {}", snapshot.run_state, snapshot.cursor + 1);
            for item in snapshot.items {
                println!("  [{}] {:?} {:>5.1}% {}", item.index + 1, item.status, item.percent, item.title);
            }
        }
        other => {
            return Err(format!(
                "unknown command '{}' (pause, resume, cancel, retry N, remove N, mode N audio|video, clear, status)",
                other
            ))
        }
    }
    Ok(())
}

fn print_summary(snapshot: &QueueSnapshot) {
    let done = snapshot.items.iter().filter(|i| i.status == JobStatus::Completed).count();
    let failed = snapshot.items.iter().filter(|i| i.status == JobStatus::Failed).count();
    println!("Batch finished: {} completed, {} failed", done, failed);
}

async fn batch(state: &AppState, file: Option<PathBuf>, audio: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let raw = read_urls(file, &mut lines).await?;
    let mode = audio.then_some(JobMode::Audio);

    let snapshot = commands::batch::submit_batch(state, &raw, mode)
        .await
        .map_err(|e| anyhow!(e))?;
    println!("Queued {} item(s)", snapshot.items.len());

    loop {
        tokio::select! {
            settled = state.batch.wait_until_settled() => {
                if matches!(settled.run_state, BatchRunState::Completed | BatchRunState::Idle) {
                    print_summary(&settled);
                    return Ok(());
                }
                // Paused: nothing runs until the next console command.
                match lines.next_line().await? {
                    Some(line) => {
                        if let Err(e) = handle_console_line(state, &line).await {
                            eprintln!("{}", e);
                        }
                    }
                    None => {
                        print_summary(&settled);
                        return Ok(());
                    }
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Err(e) = handle_console_line(state, &line).await {
                            eprintln!("{}", e);
                        }
                    }
                    None => {
                        let settled = state.batch.wait_until_settled().await;
                        print_summary(&settled);
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn cookies(state: &AppState, action: CookieAction) -> anyhow::Result<()> {
    let paths = state.paths.as_ref();
    match action {
        CookieAction::Save { platform, file } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let saved = commands::cookies::save_platform_cookies(paths, &platform, &content)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("Saved cookies to {}", saved);
        }
        CookieAction::Status { platform } => {
            let status = commands::cookies::get_cookie_status(paths, &platform)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        CookieAction::Delete { platform } => {
            commands::cookies::delete_platform_cookies(paths, &platform)
                .await
                .map_err(|e| anyhow!(e))?;
            println!("Deleted cookies for {}", platform);
        }
    }
    Ok(())
}
