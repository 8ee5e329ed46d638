//! macOS login keychain backend.
//!
//! Uses the generic password API of `security-framework`, which does not
//! expose accessibility, data-protection or prompt attributes; those are
//! reported as unsupported so the query builder leaves them out.

use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::debug;
use zeroize::Zeroizing;

use super::{SecureItemStore, StoreCapabilities, StoreStatus};
use crate::query::ItemQuery;

/// Keychain service name used for items without a service.
///
/// Named services are stored as `"oubliette:{service}"`, so no caller
/// supplied name maps onto this one.
pub const DEFAULT_SERVICE: &str = "oubliette";

/// A [`SecureItemStore`] over the user's login keychain.
#[derive(Debug, Default)]
pub struct KeychainItemStore;

impl KeychainItemStore {
    pub fn new() -> Self {
        Self
    }

    fn names(query: &ItemQuery) -> Result<(String, &str), StoreStatus> {
        let account = query.account().ok_or(StoreStatus::PARAM)?;
        let service = match query.service() {
            Some(service) => format!("{DEFAULT_SERVICE}:{service}"),
            None => DEFAULT_SERVICE.to_string(),
        };
        Ok((service, account))
    }

    fn status(err: security_framework::base::Error) -> StoreStatus {
        StoreStatus(err.code())
    }

    fn probe(service: &str, account: &str) -> Result<(), StoreStatus> {
        get_generic_password(service, account)
            .map(|value| drop(Zeroizing::new(value)))
            .map_err(Self::status)
    }
}

impl SecureItemStore for KeychainItemStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    fn add(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        let (service, account) = Self::names(query)?;
        // set_generic_password overwrites, so check first.
        match Self::probe(&service, account) {
            Ok(()) => return Err(StoreStatus::DUPLICATE_ITEM),
            Err(StoreStatus::ITEM_NOT_FOUND) => {}
            Err(status) => return Err(status),
        }
        debug!(service = %service, account, "keychain add");
        set_generic_password(&service, account, value).map_err(Self::status)
    }

    fn update(&self, query: &ItemQuery, value: &[u8]) -> Result<(), StoreStatus> {
        let (service, account) = Self::names(query)?;
        Self::probe(&service, account)?;
        debug!(service = %service, account, "keychain update");
        set_generic_password(&service, account, value).map_err(Self::status)
    }

    fn copy_matching(&self, query: &ItemQuery) -> Result<Option<Vec<u8>>, StoreStatus> {
        let (service, account) = Self::names(query)?;
        if !query.return_data() {
            return Self::probe(&service, account).map(|()| None);
        }
        get_generic_password(&service, account)
            .map(Some)
            .map_err(Self::status)
    }

    fn delete(&self, query: &ItemQuery) -> Result<(), StoreStatus> {
        let (service, account) = Self::names(query)?;
        debug!(service = %service, account, "keychain delete");
        delete_generic_password(&service, account).map_err(Self::status)
    }
}
