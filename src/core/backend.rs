use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vibe_core::core::events::ProgressEvent;
use vibe_core::models::job::JobDescriptor;
use vibe_core::platforms::Platform;

use crate::models::media::MetadataResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    LoginRequired,
    Private,
    Unavailable,
    AgeRestricted,
    RegionBlocked,
    NotFound,
    Timeout,
    Network,
    UnsupportedStory,
    UnsupportedUrl,
    Other,
}

impl FetchErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            FetchErrorKind::LoginRequired => "Login required. This content is private or requires authentication.",
            FetchErrorKind::Private => "This video is private and cannot be accessed.",
            FetchErrorKind::Unavailable => "This video is unavailable or has been removed.",
            FetchErrorKind::AgeRestricted => "Age-restricted content. Login required to access.",
            FetchErrorKind::RegionBlocked => "This content is blocked in your region.",
            FetchErrorKind::NotFound => "Content not found. Check the URL and try again.",
            FetchErrorKind::Timeout => "Request timed out. Please try again.",
            FetchErrorKind::Network => "Network error. Check your internet connection.",
            FetchErrorKind::UnsupportedStory => "Facebook Stories are not supported by the downloader.",
            FetchErrorKind::UnsupportedUrl => "This URL is not supported.",
            FetchErrorKind::Other => "Failed to fetch video info",
        }
    }
}

/// Maps raw extractor output to a user-facing category. Checks run in a fixed
/// order; the first match wins.
pub fn classify_error(raw: &str, url: &str) -> FetchErrorKind {
    let lower = raw.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["log in", "login", "authentication"]) {
        FetchErrorKind::LoginRequired
    } else if has(&["private"]) {
        FetchErrorKind::Private
    } else if has(&["unavailable"]) {
        FetchErrorKind::Unavailable
    } else if has(&[
        "age-restricted",
        "age restricted",
        "confirm your age",
        "inappropriate for some users",
    ]) {
        FetchErrorKind::AgeRestricted
    } else if has(&["blocked", "country"]) {
        FetchErrorKind::RegionBlocked
    } else if has(&["not found", "404"]) {
        FetchErrorKind::NotFound
    } else if has(&["timed out", "timeout"]) {
        FetchErrorKind::Timeout
    } else if has(&["network", "connection"]) {
        FetchErrorKind::Network
    } else if has(&["unsupported url"]) {
        if url.contains("facebook.com/stories") {
            FetchErrorKind::UnsupportedStory
        } else {
            FetchErrorKind::UnsupportedUrl
        }
    } else {
        FetchErrorKind::Other
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .kind.message())]
pub struct MetadataError {
    pub kind: FetchErrorKind,
    pub detail: String,
}

impl MetadataError {
    pub fn from_raw(raw: impl Into<String>, url: &str) -> Self {
        let detail = raw.into();
        Self {
            kind: classify_error(&detail, url),
            detail,
        }
    }

    pub fn timeout(limit: Duration) -> Self {
        Self {
            kind: FetchErrorKind::Timeout,
            detail: format!("metadata fetch exceeded {}s", limit.as_secs()),
        }
    }
}

/// Event stream of one running transfer. The source sends any number of
/// `Progress`/`StatusText` events followed by exactly one terminal event.
pub struct MediaFetchHandle {
    events: mpsc::Receiver<ProgressEvent>,
}

impl MediaFetchHandle {
    pub fn new(events: mpsc::Receiver<ProgressEvent>) -> Self {
        Self { events }
    }

    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_metadata(
        &self,
        url: &str,
        platform: Option<Platform>,
    ) -> Result<MetadataResult, MetadataError>;

    /// Starts the transfer. The backend may honour `cancel` by terminating
    /// the transfer early; it still has to end the stream with a terminal
    /// event.
    async fn start_media_fetch(
        &self,
        job: &JobDescriptor,
        cancel: CancellationToken,
    ) -> anyhow::Result<MediaFetchHandle>;
}

/// Races a metadata fetch against `limit`. Dropping the losing future kills
/// the child process.
pub async fn fetch_metadata_within(
    backend: &dyn MediaBackend,
    url: &str,
    platform: Option<Platform>,
    limit: Duration,
) -> Result<MetadataResult, MetadataError> {
    match tokio::time::timeout(limit, backend.fetch_metadata(url, platform)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Metadata fetch for {} timed out after {:?}", url, limit);
            Err(MetadataError::timeout(limit))
        }
    }
}
