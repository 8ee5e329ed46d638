//! Versioned, hardware-backed secure credential engine for Oubliette.
//!
//! Stores small secrets in a platform item store, optionally encrypted
//! under per-service key pairs held by a secure hardware facility. Stored
//! ciphertext records which scheme version produced it, so data written
//! today stays readable after the current scheme moves on.

pub mod crypto;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod hardware;
pub mod hygiene;
pub mod outcome;
pub mod query;
pub mod scheme;
pub mod serializer;
pub mod store;

pub use descriptor::{payload_from_args, ItemDescriptor};
pub use engine::{Keystore, KeystoreBuilder};
pub use error::{HardwareError, KeystoreError, Result};
pub use hardware::{
    KeyAlgorithm, KeyGenParams, KeyPairHandle, Residency, SecureHardware, SoftwareHardware,
};
pub use hygiene::{Hygiene, SecretBuffer, WipeLedger, WipeObserver};
pub use scheme::{
    EncryptionScheme, HardwareScheme, SchemeRegistry, SchemeVersion, CURRENT_VERSION,
};
pub use serializer::Pending;
pub use store::{
    FileItemStore, MemoryItemStore, SecureItemStore, StoreCapabilities, StoreStatus,
};

pub use oubliette_core::{Accessibility, SecretBytes};
