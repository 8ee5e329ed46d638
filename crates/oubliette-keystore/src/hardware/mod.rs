//! Secure hardware facility seam.
//!
//! A facility holds asymmetric key pairs addressed by label. Only the
//! public half ever crosses into the process (inside a [`KeyPairHandle`]);
//! decryption happens inside the facility.

mod software;

use std::fmt;

use zeroize::Zeroizing;

use crate::error::HardwareError;

pub use software::SoftwareHardware;

/// Asymmetric algorithm of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    /// X25519 key agreement feeding the sealed-box transform.
    X25519,
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::X25519 => f.write_str("x25519"),
        }
    }
}

/// Whether a key pair must live in dedicated secure hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Refuse to generate on a facility without secure hardware.
    Required,
    /// Use secure hardware when the facility has it.
    Preferred,
}

/// Key generation parameters. Fixed per scheme version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyGenParams {
    pub algorithm: KeyAlgorithm,
    pub key_size_bits: u32,
    pub residency: Residency,
    /// Largest plaintext the transform accepts.
    pub max_input_len: usize,
}

/// Reference to a facility-resident key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPairHandle {
    label: String,
    algorithm: KeyAlgorithm,
    public_key: Vec<u8>,
    hardware_backed: bool,
}

impl KeyPairHandle {
    pub fn new(
        label: impl Into<String>,
        algorithm: KeyAlgorithm,
        public_key: Vec<u8>,
        hardware_backed: bool,
    ) -> Self {
        Self {
            label: label.into(),
            algorithm,
            public_key,
            hardware_backed,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn is_hardware_backed(&self) -> bool {
        self.hardware_backed
    }
}

impl fmt::Debug for KeyPairHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPairHandle")
            .field("label", &self.label)
            .field("algorithm", &self.algorithm)
            .field("public_key", &hex::encode(&self.public_key))
            .field("hardware_backed", &self.hardware_backed)
            .finish()
    }
}

/// Primitive operations of a secure hardware facility.
pub trait SecureHardware: Send + Sync {
    /// Whether keys generated here live in dedicated secure hardware.
    fn is_hardware_backed(&self) -> bool;

    /// Look up an existing key pair.
    fn fetch_key_pair(&self, label: &str) -> Result<Option<KeyPairHandle>, HardwareError>;

    /// Create a key pair. Fails with [`HardwareError::AlreadyExists`] if the
    /// label is taken, including when another caller won a creation race.
    fn generate_key_pair(
        &self,
        label: &str,
        params: &KeyGenParams,
    ) -> Result<KeyPairHandle, HardwareError>;

    /// Decrypt inside the facility with the private half of `key`.
    fn decrypt(
        &self,
        key: &KeyPairHandle,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, HardwareError>;

    /// Release sessions and cached handles. Key pairs themselves persist.
    fn close(&self) {}
}
