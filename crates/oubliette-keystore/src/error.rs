//! Error types for the keystore engine.

use thiserror::Error;

use crate::scheme::SchemeVersion;
use crate::store::StoreStatus;

/// Errors surfaced to keystore callers.
///
/// Store and hardware outcomes are translated into these variants by
/// [`crate::outcome`]; nothing is retried on the caller's behalf.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("Bad arguments: {0}")]
    BadArguments(String),

    #[error("Item not found")]
    NotFound,

    #[error("Authentication cancelled by user")]
    AuthCancelled,

    #[error("Authentication failed")]
    AuthFailed,

    #[error("Interaction not allowed in the current device state")]
    InteractionBlocked,

    #[error("Hardware failure: {0}")]
    HardwareFailure(HardwareError),

    #[error("Store failure during {context}: {status}")]
    StoreFailure { status: StoreStatus, context: String },

    #[error("Unsupported scheme version: {0}")]
    UnsupportedSchemeVersion(SchemeVersion),

    #[error("Keystore engine unavailable: {0}")]
    EngineUnavailable(String),
}

impl KeystoreError {
    /// Stable machine-readable code, suitable for a dispatch layer's error channel.
    pub fn code(&self) -> &'static str {
        match self {
            KeystoreError::BadArguments(_) => "bad_args",
            KeystoreError::NotFound => "not_found",
            KeystoreError::AuthCancelled => "auth_cancelled",
            KeystoreError::AuthFailed => "auth_failed",
            KeystoreError::InteractionBlocked => "interaction_blocked",
            KeystoreError::HardwareFailure(_) => "hardware_failure",
            KeystoreError::StoreFailure { .. } => "store_failure",
            KeystoreError::UnsupportedSchemeVersion(_) => "unsupported_scheme_version",
            KeystoreError::EngineUnavailable(_) => "engine_unavailable",
        }
    }

    /// Whether a user-facing retry (re-prompt) makes sense for this error.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            KeystoreError::AuthCancelled
                | KeystoreError::AuthFailed
                | KeystoreError::InteractionBlocked
        )
    }
}

/// Failures reported by the secure hardware facility or a scheme using it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("key pair already exists: {0}")]
    AlreadyExists(String),

    #[error("key pair not found: {0}")]
    KeyNotFound(String),

    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("hardware-resident keys are not available on this facility")]
    ResidencyUnavailable,

    #[error("input of {len} bytes exceeds the transform limit of {max} bytes")]
    InputTooLarge { len: usize, max: usize },

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("corrupted ciphertext: {0}")]
    CorruptedCiphertext(String),

    #[error("user cancelled key access")]
    UserCanceled,

    #[error("hardware facility I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HardwareError {
    fn from(err: std::io::Error) -> Self {
        HardwareError::Io(err.to_string())
    }
}

/// Convenience result alias for keystore operations.
pub type Result<T> = std::result::Result<T, KeystoreError>;
