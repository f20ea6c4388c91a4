use vibe_core::fs_paths::AppPaths;
use vibe_core::platforms::Platform;

use crate::core::cookies::{self, CookieStatus};

fn platform(name: &str) -> Result<Platform, String> {
    Platform::from_name(name).ok_or_else(|| format!("Unknown platform: {}", name))
}

pub async fn save_platform_cookies(paths: &dyn AppPaths, name: &str, content: &str) -> Result<String, String> {
    let platform = platform(name)?;
    let path = cookies::save_cookies(paths, platform, content)
        .await
        .map_err(|e| e.to_string())?;
    Ok(path.to_string_lossy().to_string())
}

pub async fn get_cookie_status(paths: &dyn AppPaths, name: &str) -> Result<CookieStatus, String> {
    Ok(cookies::cookie_status(paths, platform(name)?).await)
}

pub async fn delete_platform_cookies(paths: &dyn AppPaths, name: &str) -> Result<(), String> {
    cookies::delete_cookies(paths, platform(name)?)
        .await
        .map_err(|e| e.to_string())
}
