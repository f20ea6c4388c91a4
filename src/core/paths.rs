use std::path::{Path, PathBuf};

use vibe_core::models::job::{JobDescriptor, JobMode};
use vibe_core::platforms::Platform;

use crate::core::filename;

pub const ROOT_FOLDER: &str = "VibeDownloader";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFolder {
    Videos,
    Audio,
    Reels,
    Stories,
    Shorts,
    Playlists,
    Posts,
}

impl ContentFolder {
    pub fn name(&self) -> &'static str {
        match self {
            ContentFolder::Videos => "Videos",
            ContentFolder::Audio => "Audio",
            ContentFolder::Reels => "Reels",
            ContentFolder::Stories => "Stories",
            ContentFolder::Shorts => "Shorts",
            ContentFolder::Playlists => "Playlists",
            ContentFolder::Posts => "Posts",
        }
    }

    pub fn detect(url: &str, mode: JobMode, platform: Option<Platform>) -> Self {
        if mode == JobMode::Audio {
            ContentFolder::Audio
        } else if url.contains("/reel/") || url.contains("/reels/") {
            ContentFolder::Reels
        } else if url.contains("/stories/") || url.contains("/story/") {
            ContentFolder::Stories
        } else if url.contains("/shorts/") {
            ContentFolder::Shorts
        } else if url.contains("/playlist") {
            ContentFolder::Playlists
        } else if url.contains("/p/") && platform == Some(Platform::Instagram) {
            ContentFolder::Posts
        } else {
            ContentFolder::Videos
        }
    }
}

/// `<base>/VibeDownloader/<platform>/<content>[/<sub_folder>]`. Unknown
/// platforms are filed under `Other`.
pub fn organized_dir(
    base: &Path,
    platform: Option<Platform>,
    content: ContentFolder,
    sub_folder: Option<&str>,
) -> PathBuf {
    let platform_folder = platform.map(|p| p.folder_name()).unwrap_or("Other");
    let mut dir = base.join(ROOT_FOLDER).join(platform_folder).join(content.name());

    if let Some(sub) = sub_folder.map(filename::safe_title) {
        if !sub.is_empty() {
            dir = dir.join(sub);
        }
    }

    dir
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPlan {
    pub dir: PathBuf,
    /// Extractor output template; the extension is filled in by the tool.
    pub template: String,
    /// Where the finished file lands after merging or audio conversion.
    pub final_path: PathBuf,
}

pub fn plan_output(base: &Path, job: &JobDescriptor) -> OutputPlan {
    let mode = if job.audio_quality().is_some() {
        JobMode::Audio
    } else {
        JobMode::Video
    };
    let content = ContentFolder::detect(&job.source_url, mode, job.platform_hint);
    let dir = organized_dir(base, job.platform_hint, content, job.output_folder_hint.as_deref());
    let stem = filename::file_stem(&job.display_title);
    let ext = match mode {
        JobMode::Audio => "mp3",
        JobMode::Video => "mp4",
    };

    OutputPlan {
        template: dir.join(format!("{}.%(ext)s", stem)).to_string_lossy().to_string(),
        final_path: dir.join(format!("{}.{}", stem, ext)),
        dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_content_folders() {
        let yt = Some(Platform::YouTube);
        let ig = Some(Platform::Instagram);
        assert_eq!(
            ContentFolder::detect("https://www.instagram.com/reel/x/", JobMode::Video, ig),
            ContentFolder::Reels
        );
        assert_eq!(
            ContentFolder::detect("https://www.youtube.com/shorts/x", JobMode::Video, yt),
            ContentFolder::Shorts
        );
        assert_eq!(
            ContentFolder::detect("https://www.instagram.com/p/x/", JobMode::Video, ig),
            ContentFolder::Posts
        );
        assert_eq!(
            ContentFolder::detect("https://x.com/u/p/1", JobMode::Video, Some(Platform::X)),
            ContentFolder::Videos
        );
        assert_eq!(
            ContentFolder::detect("https://www.youtube.com/shorts/x", JobMode::Audio, yt),
            ContentFolder::Audio
        );
    }

    #[test]
    fn organized_dir_with_sub_folder() {
        let dir = organized_dir(
            Path::new("/dl"),
            Some(Platform::X),
            ContentFolder::Playlists,
            Some("My: List?"),
        );
        assert_eq!(dir, PathBuf::from("/dl/VibeDownloader/X (Twitter)/Playlists/My List"));
    }

    #[test]
    fn organized_dir_skips_empty_sub_folder() {
        let dir = organized_dir(Path::new("/dl"), None, ContentFolder::Videos, Some("???"));
        assert_eq!(dir, PathBuf::from("/dl/VibeDownloader/Other/Videos"));
    }

    #[test]
    fn plan_for_audio_job() {
        let job = JobDescriptor::new("https://www.youtube.com/watch?v=a", JobMode::Audio)
            .with_title("Song: Live!");
        let plan = plan_output(Path::new("/dl"), &job);
        assert_eq!(plan.dir, PathBuf::from("/dl/VibeDownloader/YouTube/Audio"));
        assert_eq!(plan.final_path, plan.dir.join("Song Live.mp3"));
        assert!(plan.template.ends_with("Song Live.%(ext)s"));
    }

    #[test]
    fn plan_for_video_job_uses_mp4() {
        let job = JobDescriptor::new("https://www.tiktok.com/@a/video/1", JobMode::Video)
            .with_title("clip");
        let plan = plan_output(Path::new("/dl"), &job);
        assert_eq!(plan.final_path, PathBuf::from("/dl/VibeDownloader/TikTok/Videos/clip.mp4"));
    }
}
