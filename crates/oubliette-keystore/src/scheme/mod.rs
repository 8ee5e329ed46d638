//! Versioned encryption schemes.
//!
//! A scheme version fixes the key parameters, the key label layout, and the
//! ciphertext format. Versions are never changed once released; a new
//! format gets a new version and older versions stay registered so their
//! records remain readable.

pub mod envelope;
mod hardware;
mod registry;

use crate::error::HardwareError;
use crate::hardware::KeyPairHandle;
use crate::hygiene::{Hygiene, SecretBuffer};

pub use hardware::{HardwareScheme, V1_PARAMS};
pub use registry::{SchemeFactory, SchemeRegistry, SchemeRegistryBuilder};

/// Scheme version number. Stored big-endian in front of hardware-protected records.
pub type SchemeVersion = u32;

/// Version used for all new writes.
pub const CURRENT_VERSION: SchemeVersion = 1;

/// A versioned encryption scheme over a secure hardware facility.
///
/// Implementations are shared between the registry and the engine worker,
/// so they must be thread-safe.
pub trait EncryptionScheme: Send + Sync {
    /// The version this scheme implements.
    fn version(&self) -> SchemeVersion;

    /// Return the key pair for `service_label`, generating it on first use.
    ///
    /// Concurrent callers for the same label end up with the same key pair.
    fn ensure_key_pair(&self, service_label: &str) -> Result<KeyPairHandle, HardwareError>;

    /// Return the key pair for `service_label` if it exists. Never generates.
    fn find_key_pair(&self, service_label: &str) -> Result<Option<KeyPairHandle>, HardwareError>;

    /// Encrypt `plaintext` under the public half of `key`.
    fn encrypt(&self, plaintext: &[u8], key: &KeyPairHandle) -> Result<Vec<u8>, HardwareError>;

    /// Decrypt `ciphertext` inside the facility. The result is wiped when dropped.
    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &KeyPairHandle,
        hygiene: &Hygiene,
    ) -> Result<SecretBuffer, HardwareError>;

    /// Release facility resources held by this scheme.
    fn shutdown(&self);
}
