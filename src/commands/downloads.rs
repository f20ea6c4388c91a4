use serde::{Deserialize, Serialize};
use vibe_core::core::events::SingleDownloadInfo;
use vibe_core::models::job::{JobDescriptor, JobMode};
use vibe_core::platforms::Platform;

use crate::models::media::MetadataResult;
use crate::AppState;

#[derive(Clone, Serialize)]
pub struct PlatformInfo {
    pub platform: String,
    pub supported: bool,
    pub has_cookie_slot: bool,
}

pub fn detect_platform(url: &str) -> PlatformInfo {
    match Platform::from_url(url) {
        Some(platform) => PlatformInfo {
            platform: platform.key().to_string(),
            supported: true,
            has_cookie_slot: platform.has_dedicated_cookies(),
        },
        None => PlatformInfo {
            platform: "generic".to_string(),
            supported: url.starts_with("http://") || url.starts_with("https://"),
            has_cookie_slot: false,
        },
    }
}

pub async fn get_media_info(state: &AppState, url: &str) -> Result<MetadataResult, String> {
    state.single.fetch_info(url).await.map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(default)]
    pub mode: JobMode,
    pub format_selector: Option<String>,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub output_folder: Option<String>,
}

impl DownloadRequest {
    pub fn into_job(self, embed_thumbnail: bool) -> JobDescriptor {
        let mut job = JobDescriptor::new(self.url, self.mode);
        if let Some(selector) = self.format_selector.filter(|s| !s.trim().is_empty()) {
            job = job.with_format(selector);
        }
        if let Some(title) = self.title.filter(|t| !t.trim().is_empty()) {
            job = job.with_title(title);
        }
        if let Some(folder) = self.output_folder {
            job = job.with_output_folder(folder);
        }
        job.with_thumbnail(self.thumbnail_url, embed_thumbnail)
    }
}

pub async fn start_download(state: &AppState, request: DownloadRequest) -> Result<SingleDownloadInfo, String> {
    let settings = crate::storage::config::load_settings(state.paths.as_ref());
    let job = request.into_job(settings.download.embed_thumbnail);
    state.single.start(job).await.map_err(|e| e.to_string())?;
    Ok(state.single.state().await)
}

pub async fn get_download_state(state: &AppState) -> SingleDownloadInfo {
    state.single.state().await
}

pub async fn reveal_last_download(state: &AppState) -> Result<String, String> {
    state
        .single
        .reveal_last_output()
        .await
        .map(|p| p.to_string_lossy().to_string())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_known_and_generic() {
        let info = detect_platform("https://www.instagram.com/reel/abc/");
        assert_eq!(info.platform, "instagram");
        assert!(info.has_cookie_slot);

        let info = detect_platform("https://vimeo.com/1");
        assert_eq!(info.platform, "generic");
        assert!(info.supported);
        assert!(!detect_platform("vimeo.com/1").supported);
    }

    #[test]
    fn request_builds_descriptor() {
        let job = DownloadRequest {
            url: "https://youtu.be/a".to_string(),
            mode: JobMode::Audio,
            format_selector: Some("audio_low".to_string()),
            title: Some("  ".to_string()),
            thumbnail_url: Some("https://i.ytimg.com/a.jpg".to_string()),
            output_folder: Some("Mix".to_string()),
        }
        .into_job(true);

        assert_eq!(job.format_selector, "audio_low");
        assert_eq!(job.display_title, "https://youtu.be/a");
        assert_eq!(job.output_folder_hint.as_deref(), Some("Mix"));
        assert!(job.embed_thumbnail);
    }
}
