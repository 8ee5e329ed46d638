//! Capability-aware query construction.
//!
//! [`item_query`] is the single place where platform differences are
//! absorbed: it turns a normalized [`ItemDescriptor`] into the attribute set
//! a particular store backend can honor.

use std::collections::BTreeMap;

use oubliette_core::Accessibility;

use crate::descriptor::ItemDescriptor;
use crate::store::StoreCapabilities;

/// Attribute names understood by the store backends.
pub mod attr {
    pub const CLASS: &str = "class";
    pub const ACCOUNT: &str = "account";
    pub const SERVICE: &str = "service";
    pub const ACCESSIBLE: &str = "accessible";
    pub const SYNCHRONIZABLE: &str = "synchronizable";
    pub const USE_DATA_PROTECTION: &str = "useDataProtectionKeychain";
    pub const OPERATION_PROMPT: &str = "operationPrompt";
    pub const RETURN_DATA: &str = "returnData";
    pub const MATCH_LIMIT: &str = "matchLimit";
}

/// Item class for every record written by the engine.
pub const GENERIC_PASSWORD: &str = "genericPassword";

/// Match limit used by reads.
pub const MATCH_LIMIT_ONE: &str = "one";

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
}

/// What a query is going to be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPurpose {
    /// Creating a new item: creation-only attributes are included.
    Create,
    /// Matching an existing item for update or delete.
    Match,
    /// Looking an item up, optionally returning its data.
    Read { return_data: bool },
}

/// Key-value attribute set handed to a store backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    attrs: BTreeMap<&'static str, AttrValue>,
}

impl ItemQuery {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value.
    pub fn set(&mut self, key: &'static str, value: AttrValue) {
        self.attrs.insert(key, value);
    }

    /// Get an attribute.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Whether an attribute is present.
    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// Get a string attribute.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key) {
            Some(AttrValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Get a boolean attribute, `false` when absent.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.attrs.get(key), Some(AttrValue::Bool(true)))
    }

    /// The item's alias.
    pub fn account(&self) -> Option<&str> {
        self.get_str(attr::ACCOUNT)
    }

    /// The item's service namespace; `None` is the default namespace.
    pub fn service(&self) -> Option<&str> {
        self.get_str(attr::SERVICE)
    }

    /// Accessibility requested at creation.
    pub fn accessibility(&self) -> Option<Accessibility> {
        self.get_str(attr::ACCESSIBLE).and_then(|s| s.parse().ok())
    }

    /// Whether the caller wants the item's data back.
    pub fn return_data(&self) -> bool {
        self.get_bool(attr::RETURN_DATA)
    }

    /// Iterate over attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (*k, v))
    }
}

/// Build the attribute set for `descriptor` on a backend with `caps`.
pub fn item_query(
    descriptor: &ItemDescriptor,
    caps: &StoreCapabilities,
    purpose: QueryPurpose,
) -> ItemQuery {
    let mut query = ItemQuery::new();
    query.set(attr::CLASS, AttrValue::Str(GENERIC_PASSWORD.to_string()));
    query.set(attr::ACCOUNT, AttrValue::Str(descriptor.alias.clone()));
    if let Some(service) = &descriptor.service {
        query.set(attr::SERVICE, AttrValue::Str(service.clone()));
    }
    if caps.synchronizable {
        query.set(attr::SYNCHRONIZABLE, AttrValue::Bool(false));
    }
    if descriptor.use_data_protection && caps.data_protection {
        query.set(attr::USE_DATA_PROTECTION, AttrValue::Bool(true));
    }

    match purpose {
        QueryPurpose::Create => {
            if caps.accessibility {
                query.set(
                    attr::ACCESSIBLE,
                    AttrValue::Str(descriptor.accessibility.as_str().to_string()),
                );
            }
        }
        QueryPurpose::Match => {}
        QueryPurpose::Read { return_data } => {
            query.set(attr::MATCH_LIMIT, AttrValue::Str(MATCH_LIMIT_ONE.to_string()));
            query.set(attr::RETURN_DATA, AttrValue::Bool(return_data));
            // Existence probes never prompt.
            if return_data && caps.operation_prompt {
                if let Some(prompt) = &descriptor.auth_prompt {
                    query.set(attr::OPERATION_PROMPT, AttrValue::Str(prompt.clone()));
                }
            }
        }
    }

    query
}
