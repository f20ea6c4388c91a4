use std::path::PathBuf;

use vibe_core::fs_paths::AppPaths;

use crate::models::settings::AppSettings;
use crate::storage::config;

pub fn get_settings(paths: &dyn AppPaths) -> AppSettings {
    config::load_settings(paths)
}

/// Merges a partial JSON object into the stored settings.
pub fn update_settings(paths: &dyn AppPaths, partial: &str) -> Result<AppSettings, String> {
    let current = config::load_settings(paths);

    let patch: serde_json::Value =
        serde_json::from_str(partial).map_err(|e| format!("Invalid JSON: {}", e))?;
    let mut current_val =
        serde_json::to_value(&current).map_err(|e| format!("Serialize: {}", e))?;
    merge_json(&mut current_val, &patch);
    let updated: AppSettings =
        serde_json::from_value(current_val).map_err(|e| format!("Deserialize: {}", e))?;
    config::save_settings(paths, &updated).map_err(|e| format!("Save: {}", e))?;

    Ok(updated)
}

pub fn reset_settings(paths: &dyn AppPaths) -> Result<AppSettings, String> {
    let defaults = AppSettings::default();
    config::save_settings(paths, &defaults).map_err(|e| format!("Save: {}", e))?;
    Ok(defaults)
}

pub fn set_download_path(paths: &dyn AppPaths, path: PathBuf) -> Result<AppSettings, String> {
    if path.exists() && !path.is_dir() {
        return Err(format!("Not a directory: {}", path.display()));
    }
    let mut current = config::load_settings(paths);
    current.download_base_path = path;
    config::save_settings(paths, &current).map_err(|e| format!("Save: {}", e))?;
    Ok(current)
}

fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    if let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) {
        for (key, value) in patch_obj {
            match base_obj.get_mut(key) {
                Some(existing) if value.is_object() && existing.is_object() => merge_json(existing, value),
                _ => {
                    base_obj.insert(key.clone(), value.clone());
                }
            }
        }
    }
}
