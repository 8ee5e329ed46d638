//! X25519 sealed-box transform.
//!
//! Anyone holding a recipient's public key can seal; only the holder of the
//! private key can open. Each seal uses a fresh ephemeral key pair: the
//! ECDH shared secret is run through HKDF-SHA256 (salted with both public
//! keys) to an AES-256-GCM key, and a random nonce is generated per message.
//!
//! ```text
//! ephemeral_public (32) || nonce (12) || ciphertext || tag (16)
//! ```

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::HardwareError;

/// Size of an X25519 public key.
pub const PUBLIC_KEY_SIZE: usize = 32;

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const TAG_SIZE: usize = 16;

/// Bytes added to a plaintext by [`seal`].
pub const SEAL_OVERHEAD: usize = PUBLIC_KEY_SIZE + NONCE_SIZE + TAG_SIZE;

/// HKDF info string used to domain-separate derived keys.
const HKDF_INFO: &[u8] = b"oubliette-sealed-box-v1";

/// Derive the AES key from an ECDH shared secret.
fn derive_key(
    shared_secret: &[u8],
    ephemeral_public: &[u8; PUBLIC_KEY_SIZE],
    recipient_public: &[u8; PUBLIC_KEY_SIZE],
) -> Result<Zeroizing<[u8; KEY_SIZE]>, HardwareError> {
    let mut salt = [0u8; PUBLIC_KEY_SIZE * 2];
    salt[..PUBLIC_KEY_SIZE].copy_from_slice(ephemeral_public);
    salt[PUBLIC_KEY_SIZE..].copy_from_slice(recipient_public);

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hk.expand(HKDF_INFO, &mut okm[..])
        .map_err(|e| HardwareError::EncryptionFailed(format!("key derivation failed: {e}")))?;
    Ok(okm)
}

fn public_key_from_slice(bytes: &[u8]) -> Result<[u8; PUBLIC_KEY_SIZE], HardwareError> {
    bytes.try_into().map_err(|_| {
        HardwareError::EncryptionFailed(format!(
            "public key must be {PUBLIC_KEY_SIZE} bytes, got {}",
            bytes.len()
        ))
    })
}

/// Seal `plaintext` to `recipient_public`.
pub fn seal(recipient_public: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, HardwareError> {
    let recipient_bytes = public_key_from_slice(recipient_public)?;
    let recipient = PublicKey::from(recipient_bytes);

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(&recipient);

    let key = derive_key(shared.as_bytes(), ephemeral_public.as_bytes(), &recipient_bytes)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| HardwareError::EncryptionFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| HardwareError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(SEAL_OVERHEAD + plaintext.len());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a sealed box with the recipient's private key.
pub fn open(
    recipient_secret: &StaticSecret,
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>, HardwareError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(HardwareError::CorruptedCiphertext(format!(
            "sealed box of {} bytes is shorter than the {SEAL_OVERHEAD}-byte overhead",
            sealed.len()
        )));
    }

    let (ephemeral_bytes, rest) = sealed.split_at(PUBLIC_KEY_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);

    let ephemeral_bytes = public_key_from_slice(ephemeral_bytes)?;
    let ephemeral_public = PublicKey::from(ephemeral_bytes);
    let recipient_public = PublicKey::from(recipient_secret);
    let shared = recipient_secret.diffie_hellman(&ephemeral_public);

    let key = derive_key(shared.as_bytes(), &ephemeral_bytes, recipient_public.as_bytes())?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| HardwareError::DecryptionFailed(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| HardwareError::DecryptionFailed("authentication tag mismatch".to_string()))
}
