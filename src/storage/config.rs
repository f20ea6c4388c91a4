use std::path::Path;

use vibe_core::fs_paths::AppPaths;

use crate::models::settings::AppSettings;

pub fn load_settings(paths: &dyn AppPaths) -> AppSettings {
    load_settings_from(&paths.settings_path())
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    let json = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => return AppSettings::default(),
    };

    match serde_json::from_str::<AppSettings>(&json) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Ignoring unreadable settings at {}: {}", path.display(), e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(paths: &dyn AppPaths, settings: &AppSettings) -> anyhow::Result<()> {
    let path = paths.settings_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, json)?;
    Ok(())
}
