//! Scoped secret buffers.
//!
//! Every engine-owned buffer that holds plaintext or scheme intermediates
//! is a [`SecretBuffer`]. Dropping the buffer overwrites it with zeros, so
//! success paths, `?` early returns, and panics unwinding through a job all
//! leave nothing recoverable behind. Callers receive a [`SecretBytes`] copy
//! taken before the buffer is released.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use oubliette_core::SecretBytes;
use zeroize::Zeroize;

/// Instrumentation hook for buffer acquire/release.
pub trait WipeObserver: Send + Sync {
    /// A buffer of `len` bytes was taken into custody.
    fn acquired(&self, label: &'static str, len: usize);

    /// A buffer was released; `zeroed` reports whether every byte read back as zero.
    fn released(&self, label: &'static str, len: usize, zeroed: bool);
}

/// Factory for [`SecretBuffer`]s sharing one optional observer.
#[derive(Clone, Default)]
pub struct Hygiene {
    observer: Option<Arc<dyn WipeObserver>>,
}

impl Hygiene {
    /// Create a factory reporting to `observer`, if any.
    pub fn new(observer: Option<Arc<dyn WipeObserver>>) -> Self {
        Self { observer }
    }

    /// Take ownership of `bytes`, wiping them when the buffer drops.
    pub fn wrap(&self, label: &'static str, bytes: Vec<u8>) -> SecretBuffer {
        if let Some(observer) = &self.observer {
            observer.acquired(label, bytes.len());
        }
        SecretBuffer {
            label,
            bytes,
            observer: self.observer.clone(),
        }
    }
}

impl fmt::Debug for Hygiene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hygiene")
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

/// A byte buffer that is zeroed when dropped.
pub struct SecretBuffer {
    label: &'static str,
    bytes: Vec<u8>,
    observer: Option<Arc<dyn WipeObserver>>,
}

impl SecretBuffer {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the contents out for handoff. The copy is complete before this
    /// buffer can be dropped.
    pub fn to_secret(&self) -> SecretBytes {
        SecretBytes::copy_from(&self.bytes)
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        let len = self.bytes.len();
        self.bytes.as_mut_slice().zeroize();
        if let Some(observer) = &self.observer {
            let zeroed = self.bytes.iter().all(|b| *b == 0);
            observer.released(self.label, len, zeroed);
        }
        // Also clears spare capacity.
        self.bytes.zeroize();
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuffer({}, [REDACTED; {} bytes])", self.label, self.bytes.len())
    }
}

/// A [`WipeObserver`] that counts buffers.
///
/// Once the engine is idle, `outstanding() == 0 && unwiped() == 0` means
/// every buffer taken into custody was released and read back as zeros.
#[derive(Debug, Default)]
pub struct WipeLedger {
    acquired: AtomicUsize,
    released: AtomicUsize,
    unwiped: AtomicUsize,
}

impl WipeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Buffers acquired but not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired_count().saturating_sub(self.released_count())
    }

    /// Buffers released with non-zero bytes.
    pub fn unwiped(&self) -> usize {
        self.unwiped.load(Ordering::SeqCst)
    }
}

impl WipeObserver for WipeLedger {
    fn acquired(&self, _label: &'static str, _len: usize) {
        self.acquired.fetch_add(1, Ordering::SeqCst);
    }

    fn released(&self, label: &'static str, len: usize, zeroed: bool) {
        self.released.fetch_add(1, Ordering::SeqCst);
        if !zeroed {
            tracing::error!(label, len, "secret buffer released without being wiped");
            self.unwiped.fetch_add(1, Ordering::SeqCst);
        }
    }
}
