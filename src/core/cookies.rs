use std::path::PathBuf;

use anyhow::anyhow;
use serde::Serialize;
use vibe_core::fs_paths::AppPaths;
use vibe_core::platforms::Platform;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CookieStatus {
    pub exists: bool,
    pub path: Option<PathBuf>,
}

pub async fn save_cookies(paths: &dyn AppPaths, platform: Platform, content: &str) -> anyhow::Result<PathBuf> {
    let content = content.trim();
    if content.is_empty() {
        return Err(anyhow!("Empty cookie content"));
    }

    let target = paths.cookie_path(platform);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Write beside the target and rename so a concurrent reader never sees
    // a half-written file.
    let staging = target.with_extension("txt.tmp");
    tokio::fs::write(&staging, content).await?;
    tokio::fs::rename(&staging, &target).await?;

    tracing::info!("Cookies saved to {} for {}", target.display(), platform);
    Ok(target)
}

pub async fn cookie_status(paths: &dyn AppPaths, platform: Platform) -> CookieStatus {
    let target = paths.cookie_path(platform);
    match tokio::fs::metadata(&target).await {
        Ok(meta) if meta.is_file() => CookieStatus {
            exists: meta.len() > 0,
            path: Some(target),
        },
        _ => CookieStatus {
            exists: false,
            path: None,
        },
    }
}

pub async fn delete_cookies(paths: &dyn AppPaths, platform: Platform) -> anyhow::Result<()> {
    let target = paths.cookie_path(platform);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        tokio::fs::remove_file(&target).await?;
        tracing::info!("Cookies deleted for {}", platform);
    }
    Ok(())
}

/// Cookie file to pass for a request to `platform`.
///
/// A platform with a dedicated slot only ever gets its own file; if that file
/// is missing the request goes out without cookies. The legacy global file is
/// consulted only for platforms without a slot, including unrecognised sites.
pub fn resolve_cookie_file(paths: &dyn AppPaths, platform: Option<Platform>) -> Option<PathBuf> {
    match platform {
        Some(p) if p.has_dedicated_cookies() => {
            let path = paths.cookie_path(p);
            if path.is_file() {
                tracing::debug!("Using {} cookies at {}", p, path.display());
                Some(path)
            } else {
                None
            }
        }
        _ => {
            let legacy = paths.legacy_cookie_path();
            if legacy.is_file() {
                tracing::debug!("Using legacy cookies.txt");
                Some(legacy)
            } else {
                None
            }
        }
    }
}
