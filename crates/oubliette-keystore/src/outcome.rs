//! Translation of raw store and hardware outcomes into [`KeystoreError`].
//!
//! This is the only place that knows which store statuses mean what to a
//! caller. Nothing here retries.

use tracing::{debug, warn};

use crate::error::{HardwareError, KeystoreError, Result};
use crate::store::StoreStatus;

/// Map a non-success store status.
pub fn map_status(status: StoreStatus, context: &str) -> KeystoreError {
    let err = match status {
        StoreStatus::ITEM_NOT_FOUND => KeystoreError::NotFound,
        StoreStatus::USER_CANCELED => KeystoreError::AuthCancelled,
        StoreStatus::AUTH_FAILED => KeystoreError::AuthFailed,
        StoreStatus::INTERACTION_NOT_ALLOWED => KeystoreError::InteractionBlocked,
        _ => KeystoreError::StoreFailure {
            status,
            context: context.to_string(),
        },
    };
    match &err {
        KeystoreError::NotFound => debug!(context, "item not found"),
        KeystoreError::StoreFailure { .. } => warn!(context, %status, "store operation failed"),
        _ => debug!(context, code = err.code(), "store reported an authentication outcome"),
    }
    err
}

/// Map a store result where a missing item is an ordinary answer.
pub fn found<T>(result: std::result::Result<T, StoreStatus>, context: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreStatus::ITEM_NOT_FOUND) => Ok(None),
        Err(status) => Err(map_status(status, context)),
    }
}

/// Map a store result where a missing item counts as success (idempotent delete).
pub fn absent_ok(result: std::result::Result<(), StoreStatus>, context: &str) -> Result<()> {
    match result {
        Ok(()) | Err(StoreStatus::ITEM_NOT_FOUND) => Ok(()),
        Err(status) => Err(map_status(status, context)),
    }
}

/// Map a store result with no special cases.
pub fn completed<T>(result: std::result::Result<T, StoreStatus>, context: &str) -> Result<T> {
    result.map_err(|status| map_status(status, context))
}

impl From<HardwareError> for KeystoreError {
    fn from(err: HardwareError) -> Self {
        match err {
            HardwareError::UserCanceled => KeystoreError::AuthCancelled,
            other => {
                warn!(error = %other, "hardware operation failed");
                KeystoreError::HardwareFailure(other)
            }
        }
    }
}
