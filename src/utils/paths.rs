//! Path Utilities
//!
//! Resolves the server's data directory (~/.paperdesk/) and the files in it.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "PAPERDESK_CONFIG";

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the PaperDesk directory (~/.paperdesk/)
pub fn paperdesk_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".paperdesk"))
}

/// Config file path: `$PAPERDESK_CONFIG` or ~/.paperdesk/config.toml
pub fn config_path() -> AppResult<PathBuf> {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => Ok(PathBuf::from(path)),
        _ => Ok(paperdesk_dir()?.join("config.toml")),
    }
}

/// Default database file path (~/.paperdesk/paperdesk.db)
pub fn default_database_path() -> AppResult<PathBuf> {
    Ok(paperdesk_dir()?.join("paperdesk.db"))
}

/// Ensure the parent directory of a file exists
pub fn ensure_parent_dir(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
