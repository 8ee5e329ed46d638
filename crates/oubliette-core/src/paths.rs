//! Path resolution utilities.

use crate::env::{self, vars};
use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Oubliette base directory (`$OUBLIETTE_HOME`, else ~/.oubliette).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = env::get_var(vars::OUBLIETTE_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".oubliette"))
}

/// Get the main config file path (`$OUBLIETTE_CONFIG`, else ~/.oubliette/oubliette.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    if let Some(path) = env::get_var(vars::OUBLIETTE_CONFIG) {
        return Ok(expand_tilde(&path));
    }
    Ok(base_dir()?.join("oubliette.json5"))
}

/// Get the file-backed item store directory (~/.oubliette/items).
pub fn store_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("items"))
}

/// Get the software key directory (~/.oubliette/keys).
pub fn keys_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("keys"))
}

/// Ensure all required directories exist.
pub fn ensure_dirs() -> Result<(), ConfigError> {
    let dirs = [base_dir()?, store_dir()?, keys_dir()?];

    for dir in dirs {
        std::fs::create_dir_all(&dir)?;
    }

    Ok(())
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
