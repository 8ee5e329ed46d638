//! Configuration schema definitions.

use crate::types::Accessibility;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main Oubliette configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Platform item store selection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Secure hardware facility selection.
    #[serde(default)]
    pub hardware: HardwareConfig,

    /// Engine defaults.
    #[serde(default)]
    pub keystore: KeystoreConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Item store configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Which store backend to open.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend (defaults to ~/.oubliette/items).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Item store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON record per item on the local file system.
    #[default]
    File,
    /// Process-local store; contents are lost on exit.
    Memory,
    /// The macOS login keychain.
    Keychain,
}

/// Secure hardware configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Which hardware facility to open.
    #[serde(default)]
    pub backend: HardwareBackend,

    /// Key directory for the software facility (defaults to ~/.oubliette/keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_dir: Option<PathBuf>,
}

/// Secure hardware backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// Software emulation with keys persisted in `key_dir`.
    #[default]
    Software,
    /// Software emulation with process-local keys.
    Memory,
}

/// Engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeystoreConfig {
    /// Prefix for hardware key-pair labels.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Accessibility applied when a request does not name one.
    #[serde(default)]
    pub default_accessibility: Accessibility,
}

fn default_label_prefix() -> String {
    "oubliette".to_string()
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            label_prefix: default_label_prefix(),
            default_accessibility: Accessibility::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The level as a tracing filter directive.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}
