//! # oubliette-core
//!
//! Shared building blocks for the Oubliette workspace:
//!
//! - **Configuration**: loading, validation, and persistence of the JSON5 config file
//! - **Paths**: resolution of the base, store, and key directories
//! - **Secrets**: [`SecretBytes`], an owned byte buffer that is zeroed on drop
//! - **Types**: the [`Accessibility`] policy shared by config and keystore

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use secret::SecretBytes;
pub use types::Accessibility;
