//! Request normalization.
//!
//! An [`ItemDescriptor`] is built once per call from typed arguments or from
//! a raw argument bag, and discarded when the call completes. Only the alias
//! is mandatory; every other field degrades to its default.

use base64::Engine as _;
use oubliette_core::{Accessibility, SecretBytes};
use serde_json::Value;

use crate::error::{KeystoreError, Result};

/// Argument bag keys.
pub mod keys {
    pub const ALIAS: &str = "alias";
    pub const SERVICE: &str = "service";
    pub const ACCESSIBILITY: &str = "accessibility";
    pub const USE_DATA_PROTECTION: &str = "useDataProtection";
    pub const HARDWARE_PROTECTION: &str = "hardwareProtection";
    pub const AUTH_PROMPT: &str = "authPrompt";
    pub const DATA: &str = "data";
}

/// Label used for hardware keys of items without a service.
pub const DEFAULT_SERVICE_LABEL: &str = "default";

/// Normalized description of one stored item and how to write it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    /// Caller-chosen identifier, unique within its service.
    pub alias: String,
    /// Optional namespace; `None` is the default namespace.
    pub service: Option<String>,
    /// Release policy applied when the item is created.
    pub accessibility: Accessibility,
    /// Ask for the stronger data-protection container where available.
    pub use_data_protection: bool,
    /// Encrypt under a hardware-resident key before storing.
    pub hardware_protection: bool,
    /// Text shown if the platform prompts for authentication on read.
    pub auth_prompt: Option<String>,
}

impl ItemDescriptor {
    /// Create a descriptor with every optional field at its default.
    pub fn new(alias: impl Into<String>) -> Result<Self> {
        let alias = alias.into();
        if alias.is_empty() {
            return Err(KeystoreError::BadArguments(
                "alias must not be empty".to_string(),
            ));
        }
        Ok(Self {
            alias,
            service: None,
            accessibility: Accessibility::default(),
            use_data_protection: false,
            hardware_protection: false,
            auth_prompt: None,
        })
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_data_protection(mut self, enabled: bool) -> Self {
        self.use_data_protection = enabled;
        self
    }

    pub fn with_hardware_protection(mut self, enabled: bool) -> Self {
        self.hardware_protection = enabled;
        self
    }

    pub fn with_auth_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.auth_prompt = Some(prompt.into());
        self
    }

    /// Parse a raw argument bag using the standard default accessibility.
    pub fn parse(args: &Value) -> Result<Self> {
        Self::parse_with(args, Accessibility::default())
    }

    /// Parse a raw argument bag.
    ///
    /// Fails only when the bag is not an object or `alias` is missing, not a
    /// string, or empty. Optional fields of the wrong type fall back to
    /// their defaults; `default_accessibility` applies when no known
    /// policy name is given.
    pub fn parse_with(args: &Value, default_accessibility: Accessibility) -> Result<Self> {
        let map = args.as_object().ok_or_else(|| {
            KeystoreError::BadArguments("arguments must be an object".to_string())
        })?;

        let alias = match map.get(keys::ALIAS) {
            Some(Value::String(alias)) => alias.clone(),
            Some(_) => {
                return Err(KeystoreError::BadArguments(
                    "alias must be a string".to_string(),
                ))
            }
            None => return Err(KeystoreError::BadArguments("missing alias".to_string())),
        };

        let string_field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        let bool_field = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);

        let accessibility = map
            .get(keys::ACCESSIBILITY)
            .and_then(Value::as_str)
            .and_then(|name| name.parse().ok())
            .unwrap_or(default_accessibility);

        let mut descriptor = Self::new(alias)?;
        descriptor.service = string_field(keys::SERVICE);
        descriptor.accessibility = accessibility;
        descriptor.use_data_protection = bool_field(keys::USE_DATA_PROTECTION);
        descriptor.hardware_protection = bool_field(keys::HARDWARE_PROTECTION);
        descriptor.auth_prompt = string_field(keys::AUTH_PROMPT);
        Ok(descriptor)
    }

    /// The service name used to label hardware keys.
    pub fn service_label(&self) -> &str {
        self.service.as_deref().unwrap_or(DEFAULT_SERVICE_LABEL)
    }
}

/// Extract the `data` payload from an argument bag.
///
/// Accepts a base64 string or an array of byte values.
pub fn payload_from_args(args: &Value) -> Result<SecretBytes> {
    let data = args
        .get(keys::DATA)
        .ok_or_else(|| KeystoreError::BadArguments("missing data".to_string()))?;

    match data {
        Value::String(encoded) => base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map(SecretBytes::new)
            .map_err(|e| KeystoreError::BadArguments(format!("data is not valid base64: {e}"))),
        Value::Array(items) => {
            let mut bytes = zeroize::Zeroizing::new(Vec::with_capacity(items.len()));
            for item in items {
                let byte = item
                    .as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| {
                        KeystoreError::BadArguments("data array must hold bytes 0-255".to_string())
                    })?;
                bytes.push(byte);
            }
            Ok(SecretBytes::copy_from(&bytes))
        }
        _ => Err(KeystoreError::BadArguments(
            "data must be a base64 string or byte array".to_string(),
        )),
    }
}
