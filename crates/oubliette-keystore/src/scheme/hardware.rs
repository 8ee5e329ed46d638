//! Schemes backed by a [`SecureHardware`] facility.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::{EncryptionScheme, SchemeVersion};
use crate::crypto;
use crate::error::HardwareError;
use crate::hardware::{KeyAlgorithm, KeyGenParams, KeyPairHandle, Residency, SecureHardware};
use crate::hygiene::{Hygiene, SecretBuffer};

/// Key parameters of scheme version 1.
pub const V1_PARAMS: KeyGenParams = KeyGenParams {
    algorithm: KeyAlgorithm::X25519,
    key_size_bits: 256,
    residency: Residency::Preferred,
    max_input_len: 1024,
};

/// An [`EncryptionScheme`] using X25519 sealed boxes under facility keys.
///
/// Key labels are `"{prefix}.v{version}.{service}"`, so every version keeps
/// its own key pairs.
pub struct HardwareScheme {
    version: SchemeVersion,
    params: KeyGenParams,
    hardware: Arc<dyn SecureHardware>,
    label_prefix: String,
    initialized: AtomicBool,
}

impl HardwareScheme {
    /// Scheme version 1.
    pub fn v1(hardware: Arc<dyn SecureHardware>, label_prefix: impl Into<String>) -> Self {
        Self::new(1, V1_PARAMS, hardware, label_prefix)
    }

    /// A scheme with explicit version and parameters.
    pub fn new(
        version: SchemeVersion,
        params: KeyGenParams,
        hardware: Arc<dyn SecureHardware>,
        label_prefix: impl Into<String>,
    ) -> Self {
        Self {
            version,
            params,
            hardware,
            label_prefix: label_prefix.into(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn params(&self) -> &KeyGenParams {
        &self.params
    }

    /// Facility label for `service_label` under this version.
    pub fn key_label(&self, service_label: &str) -> String {
        format!("{}.v{}.{}", self.label_prefix, self.version, service_label)
    }

    fn mark_initialized(&self) {
        if !self.initialized.swap(true, Ordering::AcqRel) {
            debug!(version = self.version, "scheme initialized");
        }
    }
}

impl EncryptionScheme for HardwareScheme {
    fn version(&self) -> SchemeVersion {
        self.version
    }

    fn ensure_key_pair(&self, service_label: &str) -> Result<KeyPairHandle, HardwareError> {
        self.mark_initialized();
        let label = self.key_label(service_label);
        if let Some(existing) = self.hardware.fetch_key_pair(&label)? {
            return Ok(existing);
        }

        match self.hardware.generate_key_pair(&label, &self.params) {
            Ok(created) => {
                info!(version = self.version, label = %label, "created scheme key pair");
                Ok(created)
            }
            Err(HardwareError::AlreadyExists(_)) => {
                // Lost a creation race; use the winner's key.
                self.hardware
                    .fetch_key_pair(&label)?
                    .ok_or(HardwareError::KeyNotFound(label))
            }
            Err(e) => Err(e),
        }
    }

    fn find_key_pair(&self, service_label: &str) -> Result<Option<KeyPairHandle>, HardwareError> {
        self.mark_initialized();
        self.hardware.fetch_key_pair(&self.key_label(service_label))
    }

    fn encrypt(&self, plaintext: &[u8], key: &KeyPairHandle) -> Result<Vec<u8>, HardwareError> {
        if plaintext.len() > self.params.max_input_len {
            return Err(HardwareError::InputTooLarge {
                len: plaintext.len(),
                max: self.params.max_input_len,
            });
        }
        if key.algorithm() != self.params.algorithm {
            return Err(HardwareError::UnsupportedAlgorithm(key.algorithm().to_string()));
        }
        crypto::seal(key.public_key(), plaintext)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: &KeyPairHandle,
        hygiene: &Hygiene,
    ) -> Result<SecretBuffer, HardwareError> {
        if ciphertext.len() < crypto::SEAL_OVERHEAD {
            return Err(HardwareError::CorruptedCiphertext(format!(
                "{} bytes is shorter than the {}-byte sealed box overhead",
                ciphertext.len(),
                crypto::SEAL_OVERHEAD
            )));
        }
        let mut plaintext = self.hardware.decrypt(key, ciphertext)?;
        Ok(hygiene.wrap("scheme.plaintext", std::mem::take(&mut *plaintext)))
    }

    fn shutdown(&self) {
        if self.initialized.swap(false, Ordering::AcqRel) {
            debug!(version = self.version, "closing scheme hardware session");
            self.hardware.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SoftwareHardware;
    use crate::hygiene::WipeLedger;
    use std::sync::atomic::AtomicUsize;
    use zeroize::Zeroizing;

    /// Facility where another creator wins the race between our first fetch
    /// and our generate call.
    struct RacingHardware {
        inner: SoftwareHardware,
        fetches: AtomicUsize,
    }

    impl SecureHardware for RacingHardware {
        fn is_hardware_backed(&self) -> bool {
            false
        }

        fn fetch_key_pair(&self, label: &str) -> Result<Option<KeyPairHandle>, HardwareError> {
            if self.fetches.fetch_add(1, Ordering::SeqCst) == 0 {
                // The competing creator generates right after our lookup misses.
                self.inner.generate_key_pair(label, &V1_PARAMS)?;
                return Ok(None);
            }
            self.inner.fetch_key_pair(label)
        }

        fn generate_key_pair(
            &self,
            label: &str,
            params: &KeyGenParams,
        ) -> Result<KeyPairHandle, HardwareError> {
            self.inner.generate_key_pair(label, params)
        }

        fn decrypt(
            &self,
            key: &KeyPairHandle,
            ciphertext: &[u8],
        ) -> Result<Zeroizing<Vec<u8>>, HardwareError> {
            self.inner.decrypt(key, ciphertext)
        }
    }

    fn scheme() -> HardwareScheme {
        HardwareScheme::v1(Arc::new(SoftwareHardware::in_memory()), "test")
    }

    #[test]
    fn test_key_label_layout() {
        assert_eq!(scheme().key_label("svc"), "test.v1.svc");
        assert_eq!(scheme().key_label("default"), "test.v1.default");
    }

    #[test]
    fn test_ensure_key_pair_is_stable() {
        let scheme = scheme();
        assert!(scheme.find_key_pair("svc").unwrap().is_none());
        let first = scheme.ensure_key_pair("svc").unwrap();
        let second = scheme.ensure_key_pair("svc").unwrap();
        assert_eq!(first, second);
        assert_eq!(scheme.find_key_pair("svc").unwrap(), Some(first));
    }

    #[test]
    fn test_lost_creation_race_uses_winning_key() {
        let hardware = Arc::new(RacingHardware {
            inner: SoftwareHardware::in_memory(),
            fetches: AtomicUsize::new(0),
        });
        let scheme = HardwareScheme::v1(hardware.clone(), "p");

        let key = scheme.ensure_key_pair("svc").unwrap();
        assert_eq!(key.label(), "p.v1.svc");
        assert_eq!(hardware.fetches.load(Ordering::SeqCst), 2);

        let winner = hardware.inner.fetch_key_pair("p.v1.svc").unwrap().unwrap();
        assert_eq!(key.public_key(), winner.public_key());
    }

    #[test]
    fn test_services_get_distinct_keys() {
        let scheme = scheme();
        let a = scheme.ensure_key_pair("a").unwrap();
        let b = scheme.ensure_key_pair("b").unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let scheme = scheme();
        let hygiene = Hygiene::default();
        let key = scheme.ensure_key_pair("svc").unwrap();

        let ct = scheme.encrypt(b"secret123", &key).unwrap();
        assert_ne!(&ct[..], b"secret123");
        let pt = scheme.decrypt(&ct, &key, &hygiene).unwrap();
        assert_eq!(pt.as_slice(), b"secret123");
    }

    #[test]
    fn test_input_limit() {
        let scheme = scheme();
        let key = scheme.ensure_key_pair("svc").unwrap();

        assert!(scheme.encrypt(&[7u8; 1024], &key).is_ok());
        assert_eq!(
            scheme.encrypt(&[7u8; 1025], &key),
            Err(HardwareError::InputTooLarge { len: 1025, max: 1024 })
        );
    }

    #[test]
    fn test_decrypt_short_ciphertext() {
        let scheme = scheme();
        let key = scheme.ensure_key_pair("svc").unwrap();
        assert!(matches!(
            scheme.decrypt(&[1, 2, 3], &key, &Hygiene::default()),
            Err(HardwareError::CorruptedCiphertext(_))
        ));
    }

    #[test]
    fn test_decrypted_buffer_is_wiped() {
        let ledger = WipeLedger::new();
        let hygiene = Hygiene::new(Some(ledger.clone()));
        let scheme = scheme();
        let key = scheme.ensure_key_pair("svc").unwrap();

        let ct = scheme.encrypt(b"wipe me", &key).unwrap();
        let pt = scheme.decrypt(&ct, &key, &hygiene).unwrap();
        assert_eq!(ledger.outstanding(), 1);
        drop(pt);
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(ledger.unwiped(), 0);
    }

    #[test]
    fn test_version_two_keys_are_independent() {
        let hardware: Arc<dyn SecureHardware> = Arc::new(SoftwareHardware::in_memory());
        let v1 = HardwareScheme::v1(hardware.clone(), "test");
        let v2 = HardwareScheme::new(2, V1_PARAMS, hardware, "test");

        let k1 = v1.ensure_key_pair("svc").unwrap();
        let k2 = v2.ensure_key_pair("svc").unwrap();
        assert_ne!(k1.label(), k2.label());

        let ct = v1.encrypt(b"x", &k1).unwrap();
        assert!(v2.decrypt(&ct, &k2, &Hygiene::default()).is_err());
    }
}
