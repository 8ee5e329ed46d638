//! In-process item store.

use std::collections::HashMap;

use oubliette_core::Accessibility;
use parking_lot::Mutex;
use tracing::trace;
use zeroize::Zeroizing;

use super::{SecureItemStore, StoreCapabilities, StoreStatus};
use crate::query::{attr, ItemQuery};

type ItemKey = (Option<String>, String);

struct Record {
    value: Zeroizing<Vec<u8>>,
    accessibility: Option<Accessibility>,
    data_protection: bool,
}

/// Attributes recorded when an item was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordAttributes {
    pub accessibility: Option<Accessibility>,
    pub data_protection: bool,
}

/// A [`SecureItemStore`] holding items in process memory.
///
/// Supports every optional attribute, which makes it the reference backend
/// for tests. Values are zeroed when replaced or removed.
#[derive(Default)]
pub struct MemoryItemStore {
    items: Mutex<HashMap<ItemKey, Record>>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creation-time attributes of an item, if it exists.
    pub fn record_attributes(&self, service: Option<&str>, alias: &str) -> Option<RecordAttributes> {
        let key = (service.map(str::to_string), alias.to_string());
        self.items.lock().get(&key).map(|record| RecordAttributes {
            accessibility: record.accessibility,
            data_protection: record.data_protection,
        })
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn key_for(query: &ItemQuery) -> Result<ItemKey, StoreStatus> {
        let account = query.account().ok_or(StoreStatus::PARAM)?;
        Ok((query.service().map(str::to_string), account.to_string()))
    }
}

impl SecureItemStore for MemoryItemStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            accessibility: true,
            data_protection: true,
            operation_prompt: true,
            synchronizable: true,
        }
    }

    fn add(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        let key = Self::key_for(query)?;
        let mut items = self.items.lock();
        if items.contains_key(&key) {
            return Err(StoreStatus::DUPLICATE_ITEM);
        }
        trace!(account = %key.1, "memory store add");
        items.insert(
            key,
            Record {
                value: Zeroizing::new(value.to_vec()),
                accessibility: query.accessibility(),
                data_protection: query.get_bool(attr::USE_DATA_PROTECTION),
            },
        );
        Ok(())
    }

    fn update(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        let key = Self::key_for(query)?;
        let mut items = self.items.lock();
        let record = items.get_mut(&key).ok_or(StoreStatus::ITEM_NOT_FOUND)?;
        record.value = Zeroizing::new(value.to_vec());
        Ok(())
    }

    fn copy_matching(&self, query: &ItemQuery) -> Result<Option<Vec<u8>>, StoreStatus> {
        let key = Self::key_for(query)?;
        let items = self.items.lock();
        let record = items.get(&key).ok_or(StoreStatus::ITEM_NOT_FOUND)?;
        if query.return_data() {
            Ok(Some(record.value.to_vec()))
        } else {
            Ok(None)
        }
    }

    fn delete(&self, query: &ItemQuery) -> Result<(), StoreStatus> {
        let key = Self::key_for(query)?;
        self.items
            .lock()
            .remove(&key)
            .map(|_| ())
            .ok_or(StoreStatus::ITEM_NOT_FOUND)
    }
}
