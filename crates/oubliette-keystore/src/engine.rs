//! The keystore engine.
//!
//! [`Keystore`] ties a [`SecureItemStore`], a [`SchemeRegistry`] and an
//! [`AccessSerializer`] together and exposes the four item operations.
//! Every operation is queued on the engine's worker and returns a
//! [`Pending`] future.

use std::sync::Arc;

use oubliette_core::config::{HardwareBackend, StoreBackend};
use oubliette_core::{paths, Accessibility, Config, SecretBytes};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::descriptor::{payload_from_args, ItemDescriptor};
use crate::error::{HardwareError, KeystoreError, Result};
use crate::hardware::{SecureHardware, SoftwareHardware};
use crate::hygiene::{Hygiene, SecretBuffer, WipeObserver};
use crate::outcome::{absent_ok, completed, found, map_status};
use crate::query::{item_query, QueryPurpose};
use crate::scheme::{envelope, SchemeRegistry, SchemeVersion};
use crate::serializer::{AccessSerializer, Pending};
use crate::store::{FileItemStore, MemoryItemStore, SecureItemStore, StoreStatus};

/// Name of the engine's worker thread.
const WORKER_NAME: &str = "oubliette-keystore";

/// Default hardware key label prefix.
pub const DEFAULT_LABEL_PREFIX: &str = "oubliette";

/// State shared with jobs on the worker.
struct Inner {
    store: Arc<dyn SecureItemStore>,
    registry: SchemeRegistry,
    hygiene: Hygiene,
}

impl Inner {
    fn add(&self, descriptor: &ItemDescriptor, value: SecretBytes) -> Result<()> {
        let plaintext = self.hygiene.wrap("add.plaintext", value.into_inner());
        let record = if descriptor.hardware_protection {
            self.protect(descriptor, &plaintext)?
        } else {
            plaintext
        };

        let caps = self.store.capabilities();
        let create = item_query(descriptor, &caps, QueryPurpose::Create);
        match self.store.add(&create, record.as_slice()) {
            Ok(()) => {
                debug!(alias = %descriptor.alias, "item created");
                Ok(())
            }
            Err(StoreStatus::DUPLICATE_ITEM) => {
                // Existing item: replace the value, keep creation attributes.
                let matching = item_query(descriptor, &caps, QueryPurpose::Match);
                completed(self.store.update(&matching, record.as_slice()), "update")?;
                debug!(alias = %descriptor.alias, "item updated");
                Ok(())
            }
            Err(status) => Err(map_status(status, "add")),
        }
    }

    /// Encrypt under the current scheme and prefix the version.
    fn protect(&self, descriptor: &ItemDescriptor, plaintext: &SecretBuffer) -> Result<SecretBuffer> {
        let scheme = self.registry.current()?;
        let key = scheme.ensure_key_pair(descriptor.service_label())?;
        let ciphertext = scheme.encrypt(plaintext.as_slice(), &key)?;
        Ok(self.hygiene.wrap(
            "add.record",
            envelope::wrap(scheme.version(), &ciphertext),
        ))
    }

    fn read(&self, descriptor: &ItemDescriptor) -> Result<Option<SecretBytes>> {
        let query = item_query(
            descriptor,
            &self.store.capabilities(),
            QueryPurpose::Read { return_data: true },
        );
        let record = match found(self.store.copy_matching(&query), "read")? {
            None => return Ok(None),
            Some(Some(bytes)) => self.hygiene.wrap("read.record", bytes),
            // Asked for data, got none.
            Some(None) => return Err(map_status(StoreStatus::DECODE, "read")),
        };

        if !descriptor.hardware_protection {
            return Ok(Some(record.to_secret()));
        }

        let (version, ciphertext) = envelope::split(record.as_slice())?;
        let scheme = self
            .registry
            .scheme_for(version)
            .ok_or(KeystoreError::UnsupportedSchemeVersion(version))?;
        let key = scheme
            .find_key_pair(descriptor.service_label())?
            .ok_or_else(|| HardwareError::KeyNotFound(descriptor.service_label().to_string()))?;
        let plaintext = scheme.decrypt(ciphertext, &key, &self.hygiene)?;
        Ok(Some(plaintext.to_secret()))
    }

    fn delete(&self, descriptor: &ItemDescriptor) -> Result<()> {
        let query = item_query(descriptor, &self.store.capabilities(), QueryPurpose::Match);
        absent_ok(self.store.delete(&query), "delete")
    }

    fn exists(&self, descriptor: &ItemDescriptor) -> Result<bool> {
        let query = item_query(
            descriptor,
            &self.store.capabilities(),
            QueryPurpose::Read { return_data: false },
        );
        match found(self.store.copy_matching(&query), "exists")? {
            None => Ok(false),
            Some(data) => {
                // Wipe any bytes a backend returned anyway.
                if let Some(bytes) = data {
                    drop(self.hygiene.wrap("exists.record", bytes));
                }
                Ok(true)
            }
        }
    }
}

fn unavailable(what: &str, err: impl std::fmt::Display) -> KeystoreError {
    KeystoreError::EngineUnavailable(format!("{what}: {err}"))
}

/// Versioned, hardware-backed secure credential engine.
///
/// Operations for one engine instance never overlap at the store and
/// complete in the order they were issued.
///
/// # Example
///
/// ```no_run
/// use oubliette_keystore::{ItemDescriptor, Keystore, MemoryItemStore};
///
/// # async fn demo() -> oubliette_keystore::Result<()> {
/// let keystore = Keystore::builder()
///     .store(MemoryItemStore::new())
///     .build()?;
///
/// let item = ItemDescriptor::new("token")?
///     .with_service("svc")
///     .with_hardware_protection(true);
/// keystore.add(item.clone(), "secret123".into()).await?;
/// let value = keystore.read(item).await?;
/// assert_eq!(value.unwrap().expose_secret(), b"secret123");
/// keystore.shutdown();
/// # Ok(())
/// # }
/// ```
pub struct Keystore {
    inner: Arc<Inner>,
    serializer: AccessSerializer,
    default_accessibility: Accessibility,
}

impl Keystore {
    pub fn builder() -> KeystoreBuilder {
        KeystoreBuilder::default()
    }

    /// Assemble an engine from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn SecureItemStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(MemoryItemStore::new()),
            StoreBackend::File => {
                let dir = match &config.store.path {
                    Some(path) => path.clone(),
                    None => paths::store_dir().map_err(|e| unavailable("store directory", e))?,
                };
                Arc::new(FileItemStore::open(&dir).map_err(|e| unavailable("file store", e))?)
            }
            #[cfg(target_os = "macos")]
            StoreBackend::Keychain => Arc::new(crate::store::KeychainItemStore::new()),
            #[cfg(not(target_os = "macos"))]
            StoreBackend::Keychain => {
                return Err(KeystoreError::EngineUnavailable(
                    "the keychain store backend is only available on macOS".to_string(),
                ))
            }
        };

        let hardware: Arc<dyn SecureHardware> = match config.hardware.backend {
            HardwareBackend::Memory => Arc::new(SoftwareHardware::in_memory()),
            HardwareBackend::Software => {
                let dir = match &config.hardware.key_dir {
                    Some(path) => path.clone(),
                    None => paths::keys_dir().map_err(|e| unavailable("key directory", e))?,
                };
                Arc::new(SoftwareHardware::open(dir)?)
            }
        };

        Self::builder()
            .shared_store(store)
            .shared_hardware(hardware)
            .label_prefix(config.keystore.label_prefix.clone())
            .default_accessibility(config.keystore.default_accessibility)
            .build()
    }

    /// Store `value` under `descriptor`, replacing the value of an existing item.
    pub fn add(&self, descriptor: ItemDescriptor, value: SecretBytes) -> Pending<()> {
        debug!(alias = %descriptor.alias, hardware = descriptor.hardware_protection, "enqueue add");
        let inner = self.inner.clone();
        self.serializer.submit(move || inner.add(&descriptor, value))
    }

    /// Fetch the value stored under `descriptor`; `None` if there is no item.
    pub fn read(&self, descriptor: ItemDescriptor) -> Pending<Option<SecretBytes>> {
        debug!(alias = %descriptor.alias, hardware = descriptor.hardware_protection, "enqueue read");
        let inner = self.inner.clone();
        self.serializer.submit(move || inner.read(&descriptor))
    }

    /// Remove the item. Removing a missing item succeeds.
    pub fn delete(&self, descriptor: ItemDescriptor) -> Pending<()> {
        debug!(alias = %descriptor.alias, "enqueue delete");
        let inner = self.inner.clone();
        self.serializer.submit(move || inner.delete(&descriptor))
    }

    /// Whether an item exists. Never decrypts and never prompts.
    pub fn exists(&self, descriptor: ItemDescriptor) -> Pending<bool> {
        debug!(alias = %descriptor.alias, "enqueue exists");
        let inner = self.inner.clone();
        self.serializer.submit(move || inner.exists(&descriptor))
    }

    /// [`Keystore::add`] taking an argument bag with `alias`, optional
    /// attributes and a `data` payload.
    pub fn add_with_args(&self, args: &Value) -> Pending<()> {
        let parsed = self
            .parse_args(args)
            .and_then(|descriptor| Ok((descriptor, payload_from_args(args)?)));
        match parsed {
            Ok((descriptor, value)) => self.add(descriptor, value),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// [`Keystore::read`] taking an argument bag.
    pub fn read_with_args(&self, args: &Value) -> Pending<Option<SecretBytes>> {
        match self.parse_args(args) {
            Ok(descriptor) => self.read(descriptor),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// [`Keystore::delete`] taking an argument bag.
    pub fn delete_with_args(&self, args: &Value) -> Pending<()> {
        match self.parse_args(args) {
            Ok(descriptor) => self.delete(descriptor),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    /// [`Keystore::exists`] taking an argument bag.
    pub fn exists_with_args(&self, args: &Value) -> Pending<bool> {
        match self.parse_args(args) {
            Ok(descriptor) => self.exists(descriptor),
            Err(e) => Pending::ready(Err(e)),
        }
    }

    fn parse_args(&self, args: &Value) -> Result<ItemDescriptor> {
        ItemDescriptor::parse_with(args, self.default_accessibility)
    }

    /// Version used for new hardware-protected writes.
    pub fn current_scheme_version(&self) -> SchemeVersion {
        self.inner.registry.current_version()
    }

    /// Whether operations are still accepted.
    pub fn is_running(&self) -> bool {
        self.serializer.is_running()
    }

    /// Drain queued operations, stop the worker, and release scheme resources.
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn shutdown(&self) {
        if !self.serializer.is_running() {
            return;
        }
        self.serializer.shutdown();
        self.inner.registry.shutdown();
        info!("keystore shut down");
    }
}

impl Drop for Keystore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore")
            .field("registry", &self.inner.registry)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Builder for [`Keystore`].
#[derive(Default)]
pub struct KeystoreBuilder {
    store: Option<Arc<dyn SecureItemStore>>,
    hardware: Option<Arc<dyn SecureHardware>>,
    registry: Option<SchemeRegistry>,
    label_prefix: Option<String>,
    wipe_observer: Option<Arc<dyn WipeObserver>>,
    default_accessibility: Accessibility,
}

impl KeystoreBuilder {
    /// Item store backend. Required.
    pub fn store(self, store: impl SecureItemStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    /// Item store backend shared with other owners.
    pub fn shared_store(mut self, store: Arc<dyn SecureItemStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Hardware facility for the standard registry.
    pub fn hardware(self, hardware: impl SecureHardware + 'static) -> Self {
        self.shared_hardware(Arc::new(hardware))
    }

    /// Hardware facility shared with other owners.
    pub fn shared_hardware(mut self, hardware: Arc<dyn SecureHardware>) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Use a custom scheme registry instead of the standard one.
    pub fn registry(mut self, registry: SchemeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Prefix for hardware key labels in the standard registry.
    pub fn label_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.label_prefix = Some(prefix.into());
        self
    }

    /// Report secret buffer acquire/release to `observer`.
    pub fn wipe_observer(mut self, observer: Arc<dyn WipeObserver>) -> Self {
        self.wipe_observer = Some(observer);
        self
    }

    /// Accessibility applied by the argument-bag operations when none is given.
    pub fn default_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.default_accessibility = accessibility;
        self
    }

    pub fn build(self) -> Result<Keystore> {
        let store = self
            .store
            .ok_or_else(|| KeystoreError::BadArguments("a store backend is required".to_string()))?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let hardware = self.hardware.unwrap_or_else(|| {
                    warn!("no hardware facility configured; using in-memory software keys");
                    Arc::new(SoftwareHardware::in_memory())
                });
                let prefix = self
                    .label_prefix
                    .unwrap_or_else(|| DEFAULT_LABEL_PREFIX.to_string());
                SchemeRegistry::standard(hardware, prefix)
            }
        };

        let serializer = AccessSerializer::spawn(WORKER_NAME)?;
        info!(
            current_scheme = registry.current_version(),
            versions = ?registry.versions(),
            "keystore started"
        );

        Ok(Keystore {
            inner: Arc::new(Inner {
                store,
                registry,
                hygiene: Hygiene::new(self.wipe_observer),
            }),
            serializer,
            default_accessibility: self.default_accessibility,
        })
    }
}
