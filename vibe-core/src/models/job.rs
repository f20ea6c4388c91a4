use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::platforms::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    #[default]
    Video,
    Audio,
}

impl JobMode {
    pub fn default_format_selector(&self) -> &'static str {
        match self {
            JobMode::Video => "best",
            JobMode::Audio => AudioQuality::Best.selector(),
        }
    }
}

/// Fixed audio extraction tiers, keyed by the `audio_*` format selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Best,
    Standard,
    Low,
}

impl AudioQuality {
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "audio_best" => Some(AudioQuality::Best),
            "audio_standard" | "audio" => Some(AudioQuality::Standard),
            "audio_low" => Some(AudioQuality::Low),
            _ => None,
        }
    }

    pub fn selector(&self) -> &'static str {
        match self {
            AudioQuality::Best => "audio_best",
            AudioQuality::Standard => "audio_standard",
            AudioQuality::Low => "audio_low",
        }
    }

    /// Value passed to the extractor's `--audio-quality` (0 best, 9 worst).
    pub fn vbr_level(&self) -> &'static str {
        match self {
            AudioQuality::Best => "0",
            AudioQuality::Standard => "5",
            AudioQuality::Low => "9",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub source_url: String,
    pub display_title: String,
    pub mode: JobMode,
    pub platform_hint: Option<Platform>,
    pub format_selector: String,
    pub output_folder_hint: Option<String>,
    pub thumbnail_url: Option<String>,
    pub embed_thumbnail: bool,
    pub created_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(source_url: impl Into<String>, mode: JobMode) -> Self {
        let source_url = source_url.into();
        Self {
            id: JobId::new(),
            platform_hint: Platform::from_url(&source_url),
            display_title: source_url.clone(),
            source_url,
            mode,
            format_selector: mode.default_format_selector().to_string(),
            output_folder_hint: None,
            thumbnail_url: None,
            embed_thumbnail: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_format(mut self, selector: impl Into<String>) -> Self {
        self.format_selector = selector.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.display_title = title.into();
        self
    }

    pub fn with_output_folder(mut self, folder: impl Into<String>) -> Self {
        self.output_folder_hint = Some(folder.into());
        self
    }

    pub fn with_thumbnail(mut self, url: Option<String>, embed: bool) -> Self {
        self.thumbnail_url = url;
        self.embed_thumbnail = embed;
        self
    }

    /// Audio tier for this job, if it extracts audio. An audio job with a
    /// non-audio selector falls back to the standard tier.
    pub fn audio_quality(&self) -> Option<AudioQuality> {
        match (AudioQuality::from_selector(&self.format_selector), self.mode) {
            (Some(q), _) => Some(q),
            (None, JobMode::Audio) => Some(AudioQuality::Standard),
            (None, JobMode::Video) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Resolving,
    Downloading,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Resolving | JobStatus::Downloading)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}
