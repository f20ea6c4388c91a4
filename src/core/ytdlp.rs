use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vibe_core::core::events::{ProgressEvent, TransferProgress};
use vibe_core::fs_paths::AppPaths;
use vibe_core::models::job::JobDescriptor;
use vibe_core::platforms::Platform;

use crate::core::backend::{MediaBackend, MediaFetchHandle, MetadataError};
use crate::core::paths::{self, OutputPlan};
use crate::core::{cookies, ffmpeg, process, thumbnail};
use crate::models::media::MetadataResult;
use crate::models::settings::AppSettings;
use crate::storage::config;

// yt-dlp consumes the leading `download:` as the template's type selector, so
// the marker has to live in the rendered body.
const PROGRESS_MARKER: &str = "vibe-progress|";
const PROGRESS_TEMPLATE: &str = "download:vibe-progress|%(progress._percent_str)s|%(progress._total_bytes_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(progress._downloaded_bytes_str)s";
const MIN_BINARY_SIZE: u64 = 1024 * 1024;

fn bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    }
}

pub async fn find_ytdlp(paths: &dyn AppPaths) -> Option<PathBuf> {
    let managed = paths.bin_dir().join(bin_name());
    if let Ok(meta) = tokio::fs::metadata(&managed).await {
        if meta.len() >= MIN_BINARY_SIZE {
            return Some(managed);
        }
        tracing::warn!("Managed yt-dlp at {} looks truncated; ignoring it", managed.display());
    }

    if let Ok(status) = process::command(bin_name())
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        if status.success() {
            return Some(PathBuf::from(bin_name()));
        }
    }

    None
}

pub async fn ensure_ytdlp(paths: &dyn AppPaths) -> anyhow::Result<PathBuf> {
    if let Some(path) = find_ytdlp(paths).await {
        return Ok(path);
    }

    download_ytdlp_binary(paths).await
}

async fn download_ytdlp_binary(paths: &dyn AppPaths) -> anyhow::Result<PathBuf> {
    let target = paths.bin_dir().join(bin_name());

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let download_url = if cfg!(target_os = "windows") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp.exe"
    } else if cfg!(target_os = "macos") {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp_macos"
    } else {
        "https://github.com/yt-dlp/yt-dlp/releases/latest/download/yt-dlp"
    };

    tracing::info!("Downloading yt-dlp to {}", target.display());

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let response = client.get(download_url).send().await?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to download yt-dlp: HTTP {}", response.status()));
    }

    let bytes = response.bytes().await?;
    if (bytes.len() as u64) < MIN_BINARY_SIZE {
        return Err(anyhow!("Downloaded yt-dlp binary is too small ({} bytes)", bytes.len()));
    }
    tokio::fs::write(&target, &bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(&target, perms).await?;
    }

    Ok(target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistShape {
    RadioMix,
    Playlist,
    /// A watch URL that also carries a `list=`; only the video is wanted.
    VideoInList,
    Single,
}

pub fn playlist_shape(url: &str) -> PlaylistShape {
    let has_list = url.contains("list=");
    let is_mix = url.contains("start_radio=1") || url.contains("list=RD");

    if is_mix {
        PlaylistShape::RadioMix
    } else if has_list && (url.contains("/playlist") || !url.contains("watch?v=")) {
        PlaylistShape::Playlist
    } else if has_list {
        PlaylistShape::VideoInList
    } else {
        PlaylistShape::Single
    }
}

pub fn build_metadata_args(url: &str, cookie_file: Option<&Path>, settings: &AppSettings) -> Vec<String> {
    let mut args = vec![
        url.to_string(),
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
        "--socket-timeout".to_string(),
        "15".to_string(),
        "--user-agent".to_string(),
        settings.download.user_agent.clone(),
    ];

    if let Some(cookie) = cookie_file {
        args.push("--cookies".to_string());
        args.push(cookie.to_string_lossy().to_string());
    }

    match playlist_shape(url) {
        PlaylistShape::RadioMix | PlaylistShape::Playlist => {
            args.push("--flat-playlist".to_string());
            args.push("--playlist-items".to_string());
            args.push(settings.download.playlist_items.clone());
        }
        PlaylistShape::VideoInList => args.push("--no-playlist".to_string()),
        PlaylistShape::Single => {}
    }

    args
}

pub fn build_media_args(
    job: &JobDescriptor,
    plan: &OutputPlan,
    cookie_file: Option<&Path>,
    ffmpeg_dir: Option<&Path>,
    settings: &AppSettings,
) -> Vec<String> {
    let mut args = vec![
        job.source_url.clone(),
        "-o".to_string(),
        plan.template.clone(),
        "--no-playlist".to_string(),
        "--user-agent".to_string(),
        settings.download.user_agent.clone(),
    ];

    if let Some(cookie) = cookie_file {
        args.push("--cookies".to_string());
        args.push(cookie.to_string_lossy().to_string());
    }

    match job.audio_quality() {
        Some(quality) => {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
                "--audio-quality".to_string(),
                quality.vbr_level().to_string(),
            ]);
        }
        None => {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
            let selector = job.format_selector.trim();
            if selector.is_empty() || selector == "best" {
                args.push("-S".to_string());
                args.push("vcodec:h264,res,acodec:m4a".to_string());
            } else {
                args.push("-f".to_string());
                args.push(format!("{}+bestaudio/best", selector));
            }
        }
    }

    args.extend([
        "--newline".to_string(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
    ]);

    if let Some(dir) = ffmpeg_dir {
        args.push("--ffmpeg-location".to_string());
        args.push(dir.to_string_lossy().to_string());
    }

    args.push("--concurrent-fragments".to_string());
    args.push(settings.download.concurrent_fragments.to_string());

    args
}

fn field(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value == "NA" || value.eq_ignore_ascii_case("unknown") {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn parse_progress_line(line: &str) -> Option<TransferProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut parts = rest.split('|');
    let percent = parts
        .next()?
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()?;

    Some(TransferProgress {
        percent: percent.clamp(0.0, 100.0),
        total_size: field(parts.next()),
        speed: field(parts.next()),
        eta: field(parts.next()),
        downloaded_size: field(parts.next()),
    })
}

/// Post-processing steps worth showing while the percentage sits at 100.
pub fn parse_status_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with("[Merger]") {
        Some("Merging video and audio".to_string())
    } else if line.starts_with("[ExtractAudio]") {
        Some("Converting audio".to_string())
    } else if line.starts_with("[FixupM3u8]") || line.starts_with("[VideoConvertor]") {
        Some("Finalizing file".to_string())
    } else {
        None
    }
}

/// Picks the most useful line out of the extractor's stderr.
pub fn summarize_stderr(lines: &[String]) -> String {
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.iter().rev().find(|l| !l.trim().is_empty()))
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| "yt-dlp exited without output".to_string())
}

struct PostProcess {
    client: reqwest::Client,
    title: String,
    thumbnail_url: String,
}

pub struct YtDlpBackend {
    paths: Arc<dyn AppPaths>,
    client: reqwest::Client,
}

impl YtDlpBackend {
    pub fn new(paths: Arc<dyn AppPaths>) -> anyhow::Result<Self> {
        let settings = config::load_settings(paths.as_ref());
        let client = reqwest::Client::builder()
            .user_agent(settings.download.user_agent)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { paths, client })
    }

    async fn binary(&self) -> anyhow::Result<PathBuf> {
        ensure_ytdlp(self.paths.as_ref()).await
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch_metadata(
        &self,
        url: &str,
        platform: Option<Platform>,
    ) -> Result<MetadataResult, MetadataError> {
        let ytdlp = self
            .binary()
            .await
            .map_err(|e| MetadataError::from_raw(e.to_string(), url))?;
        let settings = config::load_settings(self.paths.as_ref());
        let cookie = cookies::resolve_cookie_file(self.paths.as_ref(), platform);
        let args = build_metadata_args(url, cookie.as_deref(), &settings);

        tracing::info!("Fetching info for {}", url);

        let output = process::command(&ytdlp)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MetadataError::from_raw(format!("Failed to run yt-dlp: {}", e), url))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(|l| l.to_string()).collect();
            let raw = summarize_stderr(&lines);
            tracing::error!("Info fetch error for {}: {}", url, raw);
            return Err(MetadataError::from_raw(raw, url));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            MetadataError::from_raw(format!("yt-dlp returned invalid JSON: {}", e), url)
        })?;

        Ok(MetadataResult::from_json(&json, url))
    }

    async fn start_media_fetch(
        &self,
        job: &JobDescriptor,
        cancel: CancellationToken,
    ) -> anyhow::Result<MediaFetchHandle> {
        let ytdlp = self.binary().await?;
        let settings = config::load_settings(self.paths.as_ref());
        let cookie = cookies::resolve_cookie_file(self.paths.as_ref(), job.platform_hint);
        let ffmpeg_dir = ffmpeg::ffmpeg_location(&settings, self.paths.as_ref());
        let plan = paths::plan_output(&settings.download_base_path, job);
        tokio::fs::create_dir_all(&plan.dir).await?;

        let args = build_media_args(job, &plan, cookie.as_deref(), ffmpeg_dir.as_deref(), &settings);
        tracing::info!("Starting download of '{}' into {}", job.display_title, plan.dir.display());
        tracing::debug!("yt-dlp args: {:?}", args);

        let (tx, rx) = mpsc::channel::<ProgressEvent>(64);

        if ffmpeg_dir.is_none() && !ffmpeg::is_ffmpeg_available().await {
            let _ = tx
                .send(ProgressEvent::StatusText {
                    message: "FFmpeg not found; merging and audio conversion may fail".to_string(),
                })
                .await;
        }

        let mut child = process::command(&ytdlp)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to start yt-dlp: {}", e))?;

        let stdout = child.stdout.take().ok_or_else(|| anyhow!("yt-dlp has no stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| anyhow!("yt-dlp has no stderr"))?;

        let post = match (&job.thumbnail_url, job.audio_quality()) {
            (Some(url), Some(_)) if job.embed_thumbnail => Some(PostProcess {
                client: self.client.clone(),
                title: job.display_title.clone(),
                thumbnail_url: url.clone(),
            }),
            _ => None,
        };

        tokio::spawn(drive_transfer(child, stdout, stderr, tx, cancel, plan.final_path, post));

        Ok(MediaFetchHandle::new(rx))
    }
}

async fn drive_transfer(
    mut child: tokio::process::Child,
    stdout: tokio::process::ChildStdout,
    stderr: tokio::process::ChildStderr,
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
    final_path: PathBuf,
    post: Option<PostProcess>,
) {
    let progress_tx = tx.clone();
    let stdout_reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let event = if let Some(progress) = parse_progress_line(&line) {
                ProgressEvent::Progress(progress)
            } else if let Some(message) = parse_status_line(&line) {
                ProgressEvent::StatusText { message }
            } else {
                continue;
            };
            let _ = progress_tx.send(event).await;
        }
    });

    let stderr_reader = tokio::spawn(async move {
        let mut collected = Vec::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            collected.push(line);
        }
        collected
    });

    let waited = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancel.cancelled() => None,
    };

    let status = match waited {
        Some(status) => status,
        None => {
            tracing::info!("Cancelling yt-dlp transfer");
            let _ = child.start_kill();
            let _ = child.wait().await;
            // Grandchildren (ffmpeg, the onefile bootstrapper) can hold the
            // pipes open long after the kill.
            stdout_reader.abort();
            stderr_reader.abort();
            let _ = tx.send(ProgressEvent::error("Download cancelled")).await;
            return;
        }
    };

    let _ = stdout_reader.await;
    let stderr_lines = stderr_reader.await.unwrap_or_default();

    let terminal = match status {
        Ok(s) if s.success() => {
            if let Some(post) = post {
                if let Err(e) =
                    thumbnail::embed_cover(&post.client, &final_path, &post.title, &post.thumbnail_url).await
                {
                    tracing::warn!("Thumbnail embedding failed for '{}': {}", post.title, e);
                }
            }
            ProgressEvent::Completed {
                result_path: Some(final_path),
            }
        }
        Ok(s) => {
            let message = summarize_stderr(&stderr_lines);
            tracing::error!("yt-dlp exited with {}: {}", s, message);
            ProgressEvent::error(message)
        }
        Err(e) => ProgressEvent::error(format!("yt-dlp process failed: {}", e)),
    };

    let _ = tx.send(terminal).await;
}
