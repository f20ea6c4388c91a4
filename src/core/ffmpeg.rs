use std::path::{Path, PathBuf};

use vibe_core::fs_paths::AppPaths;

use crate::models::settings::AppSettings;

fn ffmpeg_bin_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

pub async fn is_ffmpeg_available() -> bool {
    crate::core::process::command("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Directory to hand the extractor as `--ffmpeg-location`: the configured
/// override if set, else the managed bin directory when it holds ffmpeg.
/// `None` means the system PATH copy is used.
pub fn ffmpeg_location(settings: &AppSettings, paths: &dyn AppPaths) -> Option<PathBuf> {
    if let Some(custom) = &settings.download.ffmpeg_location {
        return Some(location_dir(custom));
    }

    let managed = paths.bin_dir();
    if managed.join(ffmpeg_bin_name()).is_file() {
        return Some(managed);
    }

    None
}

fn location_dir(custom: &Path) -> PathBuf {
    if custom.is_file() {
        custom.parent().map(Path::to_path_buf).unwrap_or_else(|| custom.to_path_buf())
    } else {
        custom.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_core::fs_paths::RootedPaths;

    #[test]
    fn no_location_without_override_or_managed_binary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RootedPaths::new(dir.path());
        assert_eq!(ffmpeg_location(&AppSettings::default(), &paths), None);
    }

    #[test]
    fn managed_binary_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RootedPaths::new(dir.path());
        std::fs::create_dir_all(paths.bin_dir()).unwrap();
        std::fs::write(paths.bin_dir().join(ffmpeg_bin_name()), b"bin").unwrap();
        assert_eq!(
            ffmpeg_location(&AppSettings::default(), &paths),
            Some(paths.bin_dir())
        );
    }

    #[test]
    fn override_file_resolves_to_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join(ffmpeg_bin_name());
        std::fs::write(&exe, b"bin").unwrap();
        let mut settings = AppSettings::default();
        settings.download.ffmpeg_location = Some(exe);
        let paths = RootedPaths::new(dir.path());
        assert_eq!(
            ffmpeg_location(&settings, &paths),
            Some(dir.path().to_path_buf())
        );
    }
}
