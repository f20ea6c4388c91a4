use std::path::PathBuf;

fn managed_bin_dir() -> Option<PathBuf> {
    vibe_core::fs_paths::app_data_dir().map(|d| d.join("bin"))
}

fn enhanced_path() -> Option<String> {
    let bin_dir = managed_bin_dir()?;
    let sep = if cfg!(windows) { ";" } else { ":" };
    let current = std::env::var("PATH").unwrap_or_default();
    Some(format!("{}{}{}", bin_dir.display(), sep, current))
}

/// Builds a child process command with the managed tool directory on PATH and
/// UTF-8 output forced for the Python-based extractor. The child is killed if
/// its handle is dropped, so abandoned metadata fetches do not linger.
pub fn command<S: AsRef<std::ffi::OsStr>>(program: S) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    #[cfg(target_os = "windows")]
    cmd.creation_flags(0x08000000);
    if let Some(path) = enhanced_path() {
        cmd.env("PATH", path);
    }
    cmd.env("PYTHONIOENCODING", "utf-8");
    cmd.env("PYTHONUTF8", "1");
    cmd.kill_on_drop(true);
    cmd
}

/// Opens the system file browser at the folder holding `path`.
pub fn reveal_in_folder(path: &std::path::Path) -> anyhow::Result<()> {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent().unwrap_or(path)
    };
    open::that(dir)?;
    Ok(())
}
