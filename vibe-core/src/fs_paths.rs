use std::path::PathBuf;

use crate::platforms::Platform;

pub const DATA_DIR_ENV: &str = "VIBE_DATA_DIR";

pub trait AppPaths: Send + Sync {
    fn downloads_dir(&self) -> PathBuf;
    fn data_dir(&self) -> PathBuf;

    fn bin_dir(&self) -> PathBuf {
        self.data_dir().join("bin")
    }

    fn settings_path(&self) -> PathBuf {
        self.data_dir().join("settings.json")
    }

    fn cookies_dir(&self) -> PathBuf {
        self.data_dir().join("cookies")
    }

    fn cookie_path(&self, platform: Platform) -> PathBuf {
        self.cookies_dir()
            .join(format!("cookies_{}.txt", platform.key()))
    }

    /// Global cookie file from older releases, used only for platforms
    /// without a dedicated slot.
    fn legacy_cookie_path(&self) -> PathBuf {
        self.data_dir().join("cookies.txt")
    }
}

pub struct DesktopPaths;

impl AppPaths for DesktopPaths {
    fn downloads_dir(&self) -> PathBuf {
        dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    fn data_dir(&self) -> PathBuf {
        app_data_dir().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Paths rooted at a fixed directory; used for portable installs and tests.
pub struct RootedPaths {
    root: PathBuf,
}

impl RootedPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AppPaths for RootedPaths {
    fn downloads_dir(&self) -> PathBuf {
        self.root.join("downloads")
    }

    fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }
}

pub fn app_data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return Some(PathBuf::from(dir));
    }
    dirs::data_dir().map(|d| d.join("vibe-downloader"))
}
