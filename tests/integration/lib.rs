//! Shared fixtures for the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use oubliette_keystore::query::ItemQuery;
use oubliette_keystore::{
    HardwareError, KeyGenParams, KeyPairHandle, Keystore, MemoryItemStore, SecureHardware,
    SecureItemStore, SoftwareHardware, StoreCapabilities, StoreStatus, WipeLedger,
};
use parking_lot::Mutex;
use zeroize::Zeroizing;

/// A software facility whose decryption can be switched off, simulating a
/// key that has become unusable.
pub struct BreakableHardware {
    inner: SoftwareHardware,
    broken: AtomicBool,
}

impl BreakableHardware {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SoftwareHardware::in_memory(),
            broken: AtomicBool::new(false),
        })
    }

    pub fn break_keys(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

impl SecureHardware for BreakableHardware {
    fn is_hardware_backed(&self) -> bool {
        self.inner.is_hardware_backed()
    }

    fn fetch_key_pair(&self, label: &str) -> Result<Option<KeyPairHandle>, HardwareError> {
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
        if self.broken.load(Ordering::SeqCst) {
            return Err(HardwareError::DecryptionFailed("key invalidated".to_string()));
        }
        self.inner.decrypt(key, ciphertext)
    }
}

/// A memory store that fails the next calls with queued statuses.
#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryItemStore,
    failures: Mutex<VecDeque<StoreStatus>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail the next store call with `status`.
    pub fn fail_next(&self, status: StoreStatus) {
        self.failures.lock().push_back(status);
    }

    fn scripted(&self) -> Result<(), StoreStatus> {
        match self.failures.lock().pop_front() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

impl SecureItemStore for ScriptedStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.inner.capabilities()
    }

    fn add(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        self.scripted()?;
        self.inner.add(query, value)
    }

    fn update(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        self.scripted()?;
        self.inner.update(query, value)
    }

    fn copy_matching(&self, query: &ItemQuery) -> Result<Option<Vec<u8>>, StoreStatus> {
        self.scripted()?;
        self.inner.copy_matching(query)
    }

    fn delete(&self, query: &ItemQuery) -> Result<(), StoreStatus> {
        self.scripted()?;
        self.inner.delete(query)
    }
}

/// An engine over a memory store and in-memory keys, with a wipe ledger attached.
pub fn memory_keystore() -> (Keystore, Arc<MemoryItemStore>, Arc<WipeLedger>) {
    let store = Arc::new(MemoryItemStore::new());
    let ledger = WipeLedger::new();
    let keystore = Keystore::builder()
        .shared_store(store.clone())
        .hardware(SoftwareHardware::in_memory())
        .wipe_observer(ledger.clone())
        .build()
        .expect("memory keystore");
    (keystore, store, ledger)
}
