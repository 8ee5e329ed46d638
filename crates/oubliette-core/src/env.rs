//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Common environment variable names.
pub mod vars {
    /// Oubliette home directory override.
    pub const OUBLIETTE_HOME: &str = "OUBLIETTE_HOME";

    /// Oubliette config file override.
    pub const OUBLIETTE_CONFIG: &str = "OUBLIETTE_CONFIG";

    /// Oubliette log filter (tracing `EnvFilter` syntax).
    pub const OUBLIETTE_LOG: &str = "OUBLIETTE_LOG";
}
