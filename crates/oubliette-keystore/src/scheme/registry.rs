//! Scheme registry: version lookup and lazy construction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use super::{EncryptionScheme, HardwareScheme, SchemeVersion, CURRENT_VERSION};
use crate::error::{KeystoreError, Result};
use crate::hardware::SecureHardware;

/// Builds a scheme instance on first use.
pub type SchemeFactory = Box<dyn Fn() -> Arc<dyn EncryptionScheme> + Send + Sync>;

struct Slot {
    factory: SchemeFactory,
    instance: OnceCell<Arc<dyn EncryptionScheme>>,
}

impl Slot {
    fn get(&self) -> Arc<dyn EncryptionScheme> {
        self.instance.get_or_init(|| (self.factory)()).clone()
    }
}

/// Maps scheme versions to schemes and names the version used for new writes.
///
/// Schemes are constructed the first time they are asked for, so a version
/// that is never touched costs nothing.
pub struct SchemeRegistry {
    current: SchemeVersion,
    slots: BTreeMap<SchemeVersion, Slot>,
    shut_down: AtomicBool,
}

impl SchemeRegistry {
    /// The stock registry: every released version over `hardware`.
    pub fn standard(hardware: Arc<dyn SecureHardware>, label_prefix: impl Into<String>) -> Self {
        let label_prefix = label_prefix.into();
        Self {
            current: CURRENT_VERSION,
            slots: BTreeMap::new(),
            shut_down: AtomicBool::new(false),
        }
        .with_slot(
            1,
            Box::new(move || {
                Arc::new(HardwareScheme::v1(hardware.clone(), label_prefix.clone()))
                    as Arc<dyn EncryptionScheme>
            }),
        )
    }

    /// Start a custom registry whose new writes use `current`.
    pub fn builder(current: SchemeVersion) -> SchemeRegistryBuilder {
        SchemeRegistryBuilder {
            current,
            slots: BTreeMap::new(),
        }
    }

    fn with_slot(mut self, version: SchemeVersion, factory: SchemeFactory) -> Self {
        self.slots.insert(
            version,
            Slot {
                factory,
                instance: OnceCell::new(),
            },
        );
        self
    }

    /// The version used for new writes.
    pub fn current_version(&self) -> SchemeVersion {
        self.current
    }

    /// The scheme used for new writes.
    pub fn current(&self) -> Result<Arc<dyn EncryptionScheme>> {
        self.scheme_for(self.current)
            .ok_or(KeystoreError::UnsupportedSchemeVersion(self.current))
    }

    /// The scheme for `version`, if registered.
    pub fn scheme_for(&self, version: SchemeVersion) -> Option<Arc<dyn EncryptionScheme>> {
        self.slots.get(&version).map(Slot::get)
    }

    /// Registered versions in ascending order.
    pub fn versions(&self) -> Vec<SchemeVersion> {
        self.slots.keys().copied().collect()
    }

    /// Shut down every scheme that was constructed. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        for (version, slot) in &self.slots {
            if let Some(scheme) = slot.instance.get() {
                debug!(version, "shutting down scheme");
                scheme.shutdown();
            }
        }
        info!("scheme registry shut down");
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemeRegistry")
            .field("current", &self.current)
            .field("versions", &self.versions())
            .finish()
    }
}

/// Builder for registries with custom or additional scheme versions.
pub struct SchemeRegistryBuilder {
    current: SchemeVersion,
    slots: BTreeMap<SchemeVersion, SchemeFactory>,
}

impl SchemeRegistryBuilder {
    /// Register `factory` for `version`, replacing any earlier registration.
    pub fn register<F>(mut self, version: SchemeVersion, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn EncryptionScheme> + Send + Sync + 'static,
    {
        self.slots.insert(version, Box::new(factory));
        self
    }

    /// Finish the registry. The current version must be registered.
    pub fn build(self) -> Result<SchemeRegistry> {
        if !self.slots.contains_key(&self.current) {
            return Err(KeystoreError::UnsupportedSchemeVersion(self.current));
        }
        let registry = SchemeRegistry {
            current: self.current,
            slots: BTreeMap::new(),
            shut_down: AtomicBool::new(false),
        };
        Ok(self
            .slots
            .into_iter()
            .fold(registry, |registry, (version, factory)| {
                registry.with_slot(version, factory)
            }))
    }
}
