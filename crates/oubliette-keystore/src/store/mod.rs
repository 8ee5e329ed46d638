//! Platform secure item store seam.
//!
//! The engine never touches a concrete store directly. Every backend
//! implements [`SecureItemStore`]: four primitives keyed by an
//! [`ItemQuery`](crate::query::ItemQuery), each reporting a raw
//! [`StoreStatus`] that [`crate::outcome`] translates for callers.

mod file;
#[cfg(target_os = "macos")]
mod keychain;
mod memory;

use std::fmt;

use crate::query::ItemQuery;

pub use file::FileItemStore;
#[cfg(target_os = "macos")]
pub use keychain::KeychainItemStore;
pub use memory::{MemoryItemStore, RecordAttributes};

/// Raw status code reported by a store backend.
///
/// Values follow the Security framework `OSStatus` numbering so the
/// keychain backend can forward its codes verbatim; other backends map
/// their native failures onto the same table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreStatus(pub i32);

impl StoreStatus {
    pub const SUCCESS: StoreStatus = StoreStatus(0);
    pub const IO: StoreStatus = StoreStatus(-36);
    pub const PARAM: StoreStatus = StoreStatus(-50);
    pub const USER_CANCELED: StoreStatus = StoreStatus(-128);
    pub const AUTH_FAILED: StoreStatus = StoreStatus(-25293);
    pub const DUPLICATE_ITEM: StoreStatus = StoreStatus(-25299);
    pub const ITEM_NOT_FOUND: StoreStatus = StoreStatus(-25300);
    pub const INTERACTION_NOT_ALLOWED: StoreStatus = StoreStatus(-25308);
    pub const DECODE: StoreStatus = StoreStatus(-26275);

    /// The numeric status.
    pub fn code(self) -> i32 {
        self.0
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            StoreStatus::SUCCESS => "success",
            StoreStatus::IO => "io error",
            StoreStatus::PARAM => "invalid parameter",
            StoreStatus::USER_CANCELED => "user canceled",
            StoreStatus::AUTH_FAILED => "authentication failed",
            StoreStatus::DUPLICATE_ITEM => "duplicate item",
            StoreStatus::ITEM_NOT_FOUND => "item not found",
            StoreStatus::INTERACTION_NOT_ALLOWED => "interaction not allowed",
            StoreStatus::DECODE => "decode error",
            _ => return None,
        })
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "status {}", self.0),
        }
    }
}

impl From<std::io::Error> for StoreStatus {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreStatus::ITEM_NOT_FOUND,
            std::io::ErrorKind::AlreadyExists => StoreStatus::DUPLICATE_ITEM,
            _ => StoreStatus::IO,
        }
    }
}

/// Which optional query attributes a backend understands.
///
/// Attributes a backend cannot honor are left out of the query instead of
/// failing the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Accessibility policy is recorded at creation.
    pub accessibility: bool,
    /// A stronger data-protection container can be requested.
    pub data_protection: bool,
    /// An authentication prompt string can be shown on reads.
    pub operation_prompt: bool,
    /// The synchronizable flag is meaningful (and is always pinned to false).
    pub synchronizable: bool,
}

/// Primitive operations of a platform secure item store.
///
/// Implementations are called from the engine's single worker thread and
/// may block (authentication prompts, file I/O).
pub trait SecureItemStore: Send + Sync {
    /// Optional attributes this backend supports.
    fn capabilities(&self) -> StoreCapabilities;

    /// Create a new item. Fails with [`StoreStatus::DUPLICATE_ITEM`] if one exists.
    fn add(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus>;

    /// Replace the value of an existing item, leaving its other attributes alone.
    fn update(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus>;

    /// Look an item up.
    ///
    /// Returns `Ok(Some(bytes))` when the query asks for data, `Ok(None)` when
    /// it only probes for existence, and [`StoreStatus::ITEM_NOT_FOUND`] when
    /// nothing matches.
    fn copy_matching(&self, query: &ItemQuery) -> Result<Option<Vec<u8>>, StoreStatus>;

    /// Remove an item.
    fn delete(&self, query: &ItemQuery) -> Result<(), StoreStatus>;
}
