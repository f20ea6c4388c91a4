use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::job::JobMode;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_download_base_path")]
    pub download_base_path: PathBuf,
    #[serde(default = "default_true")]
    pub minimize_to_tray: bool,
    #[serde(default)]
    pub download: DownloadSettings,
    #[serde(default)]
    pub advanced: AdvancedSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSettings {
    #[serde(default = "default_true")]
    pub embed_thumbnail: bool,
    #[serde(default)]
    pub default_batch_mode: JobMode,
    #[serde(default = "default_playlist_items")]
    pub playlist_items: String,
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

fn default_download_base_path() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_true() -> bool {
    true
}

fn default_playlist_items() -> String {
    "1:50".into()
}

fn default_concurrent_fragments() -> u32 {
    16
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

fn default_metadata_timeout_secs() -> u64 {
    45
}

fn default_item_timeout_secs() -> u64 {
    600
}

fn default_cooldown_ms() -> u64 {
    500
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            embed_thumbnail: true,
            default_batch_mode: JobMode::Video,
            playlist_items: default_playlist_items(),
            concurrent_fragments: default_concurrent_fragments(),
            user_agent: default_user_agent(),
            ffmpeg_location: None,
        }
    }
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: default_metadata_timeout_secs(),
            item_timeout_secs: default_item_timeout_secs(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            download_base_path: default_download_base_path(),
            minimize_to_tray: true,
            download: DownloadSettings::default(),
            advanced: AdvancedSettings::default(),
        }
    }
}
