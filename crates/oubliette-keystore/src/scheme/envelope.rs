//! Version-prefixed record envelope.
//!
//! Hardware-protected records are stored as a 4-byte big-endian scheme
//! version followed by the scheme's ciphertext. Plain records carry no
//! prefix.

use super::SchemeVersion;
use crate::error::HardwareError;

/// Length of the version prefix.
pub const PREFIX_LEN: usize = 4;

/// Prefix `ciphertext` with `version`.
pub fn wrap(version: SchemeVersion, ciphertext: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(PREFIX_LEN + ciphertext.len());
    record.extend_from_slice(&version.to_be_bytes());
    record.extend_from_slice(ciphertext);
    record
}

/// Split a stored record into its version and ciphertext.
pub fn split(record: &[u8]) -> Result<(SchemeVersion, &[u8]), HardwareError> {
    if record.len() < PREFIX_LEN {
        return Err(HardwareError::CorruptedCiphertext(format!(
            "record of {} bytes has no version prefix",
            record.len()
        )));
    }
    let (prefix, body) = record.split_at(PREFIX_LEN);
    let mut version = [0u8; PREFIX_LEN];
    version.copy_from_slice(prefix);
    Ok((SchemeVersion::from_be_bytes(version), body))
}
