//! Software emulation of a secure hardware facility.
//!
//! For hosts without secure hardware, and for tests. Private keys live in
//! process memory (zeroed on drop) and, when a key directory is given, in
//! `0600` files beneath it. The facility reports itself as not
//! hardware-backed so schemes that require residency refuse to use it.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rand::rngs::OsRng;
use tracing::{debug, info};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use super::{KeyAlgorithm, KeyGenParams, KeyPairHandle, Residency, SecureHardware};
use crate::crypto;
use crate::error::HardwareError;

const SECRET_KEY_SIZE: usize = 32;

/// X25519 key facility backed by memory and, optionally, a key directory.
pub struct SoftwareHardware {
    keys: Mutex<HashMap<String, StaticSecret>>,
    key_dir: Option<PathBuf>,
}

impl SoftwareHardware {
    /// Create a facility whose keys vanish with the process.
    pub fn in_memory() -> Self {
        Self {
            keys: Mutex::new(HashMap::new()),
            key_dir: None,
        }
    }

    /// Create a facility persisting keys under `key_dir`.
    pub fn open(key_dir: impl Into<PathBuf>) -> Result<Self, HardwareError> {
        let key_dir = key_dir.into();
        std::fs::create_dir_all(&key_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&key_dir, std::fs::Permissions::from_mode(0o700))?;
        }

        Ok(Self {
            keys: Mutex::new(HashMap::new()),
            key_dir: Some(key_dir),
        })
    }

    fn key_path(dir: &Path, label: &str) -> PathBuf {
        dir.join(format!("{}.key", hex::encode(label.as_bytes())))
    }

    fn handle_for(label: &str, secret: &StaticSecret) -> KeyPairHandle {
        let public = PublicKey::from(secret);
        KeyPairHandle::new(label, KeyAlgorithm::X25519, public.as_bytes().to_vec(), false)
    }

    /// Load a persisted key into the cache, if one exists on disk.
    fn load_persisted(&self, label: &str) -> Result<Option<StaticSecret>, HardwareError> {
        let Some(dir) = &self.key_dir else {
            return Ok(None);
        };
        let path = Self::key_path(dir, label);
        let encoded = match std::fs::read_to_string(&path) {
            Ok(contents) => Zeroizing::new(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let decoded = Zeroizing::new(hex::decode(encoded.trim()).map_err(|e| {
            HardwareError::Io(format!("key file {} is not valid hex: {e}", path.display()))
        })?);
        let bytes: Zeroizing<[u8; SECRET_KEY_SIZE]> =
            Zeroizing::new(decoded.as_slice().try_into().map_err(|_| {
                HardwareError::Io(format!(
                    "key file {} holds {} bytes, expected {SECRET_KEY_SIZE}",
                    path.display(),
                    decoded.len()
                ))
            })?);
        Ok(Some(StaticSecret::from(*bytes)))
    }

    /// Write a new key file, failing if another writer got there first.
    fn persist(&self, label: &str, secret: &StaticSecret) -> Result<(), HardwareError> {
        let Some(dir) = &self.key_dir else {
            return Ok(());
        };
        let path = Self::key_path(dir, label);

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = match options.open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(HardwareError::AlreadyExists(label.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let encoded = Zeroizing::new(hex::encode(secret.as_bytes()));
        file.write_all(encoded.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl SecureHardware for SoftwareHardware {
    fn is_hardware_backed(&self) -> bool {
        false
    }

    fn fetch_key_pair(&self, label: &str) -> Result<Option<KeyPairHandle>, HardwareError> {
        let mut keys = self.keys.lock();
        if let Some(secret) = keys.get(label) {
            return Ok(Some(Self::handle_for(label, secret)));
        }
        match self.load_persisted(label)? {
            Some(secret) => {
                debug!(label, "loaded persisted key pair");
                let handle = Self::handle_for(label, &secret);
                keys.insert(label.to_string(), secret);
                Ok(Some(handle))
            }
            None => Ok(None),
        }
    }

    fn generate_key_pair(
        &self,
        label: &str,
        params: &KeyGenParams,
    ) -> Result<KeyPairHandle, HardwareError> {
        if params.algorithm != KeyAlgorithm::X25519 || params.key_size_bits != 256 {
            return Err(HardwareError::UnsupportedAlgorithm(format!(
                "{}-{}",
                params.algorithm, params.key_size_bits
            )));
        }
        if params.residency == Residency::Required {
            return Err(HardwareError::ResidencyUnavailable);
        }

        let mut keys = self.keys.lock();
        if keys.contains_key(label) {
            return Err(HardwareError::AlreadyExists(label.to_string()));
        }

        let secret = StaticSecret::random_from_rng(OsRng);
        self.persist(label, &secret)?;
        let handle = Self::handle_for(label, &secret);
        keys.insert(label.to_string(), secret);
        info!(label, "generated software key pair");
        Ok(handle)
    }

    fn decrypt(
        &self,
        key: &KeyPairHandle,
        ciphertext: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, HardwareError> {
        if key.algorithm() != KeyAlgorithm::X25519 {
            return Err(HardwareError::UnsupportedAlgorithm(key.algorithm().to_string()));
        }
        // Make sure a persisted key is in the cache.
        if self.fetch_key_pair(key.label())?.is_none() {
            return Err(HardwareError::KeyNotFound(key.label().to_string()));
        }
        let keys = self.keys.lock();
        let secret = keys
            .get(key.label())
            .ok_or_else(|| HardwareError::KeyNotFound(key.label().to_string()))?;
        crypto::open(secret, ciphertext)
    }

    fn close(&self) {
        // In-memory keys are the only copy; keep them.
        if self.key_dir.is_some() {
            let mut keys = self.keys.lock();
            debug!(cached = keys.len(), "dropping cached software keys");
            keys.clear();
        }
    }
}
