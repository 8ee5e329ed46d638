//! Configuration loading and persistence.

use super::{Config, LogLevel, StoreBackend};
use crate::error::ConfigError;
use crate::paths;
use crate::types::Accessibility;
use std::fs;
use std::path::Path;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Load configuration from the default path, falling back to defaults if no file exists.
    pub fn load_or_default() -> Self {
        match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring unreadable config file: {e}");
                Self::default()
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        // 1. Label prefix becomes part of every hardware key label
        let prefix = &self.keystore.label_prefix;
        if prefix.is_empty() {
            errors.push("keystore.label_prefix must not be empty".to_string());
        } else if prefix.chars().any(|c| c.is_whitespace() || c == '.') {
            errors.push(format!(
                "keystore.label_prefix '{}' must not contain whitespace or '.'",
                prefix
            ));
        }

        // 2. Keychain backend exists only on macOS
        if self.store.backend == StoreBackend::Keychain && !cfg!(target_os = "macos") {
            errors.push("store.backend 'keychain' is only available on macOS".to_string());
        }

        // 3. A path only means something to the file backend
        if self.store.path.is_some() && self.store.backend != StoreBackend::File {
            errors.push("store.path is only used by the 'file' backend".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }
}

/// Configuration builder for creating configs programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the item store backend.
    pub fn store_backend(mut self, backend: StoreBackend) -> Self {
        self.config.store.backend = backend;
        self
    }

    /// Set the file store directory.
    pub fn store_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.store.path = Some(path.into());
        self
    }

    /// Select the hardware backend.
    pub fn hardware_backend(mut self, backend: super::HardwareBackend) -> Self {
        self.config.hardware.backend = backend;
        self
    }

    /// Set the software key directory.
    pub fn key_dir(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.config.hardware.key_dir = Some(path.into());
        self
    }

    /// Set the key label prefix.
    pub fn label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.keystore.label_prefix = prefix.into();
        self
    }

    /// Set the default accessibility policy.
    pub fn default_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.config.keystore.default_accessibility = accessibility;
        self
    }

    /// Set the log level.
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        self.config
    }
}
