//! Environment variable parsing utilities.
//!
//! Run configuration can be overlaid from `GQLFUZZ_*` variables without
//! repeating the usual parse-or-default boilerplate:
//!
//! ```
//! use gqlfuzz_types::env_utils::{env_var_or, env_millis_or};
//! use std::time::Duration;
//!
//! let workers: usize = env_var_or("GQLFUZZ_WORKERS", 4);
//! let timeout = env_millis_or("GQLFUZZ_REQUEST_TIMEOUT_MS", Duration::from_secs(10));
//! ```

use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Check if an environment variable is set to a truthy value, with a default.
///
/// "1", "true", "yes" and "on" (case-insensitive) are truthy.
pub fn env_bool_or(key: &str, default: bool) -> bool {
    match std::env::var(key).ok() {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Read a millisecond count as a [`Duration`].
pub fn env_millis_or(key: &str, default: Duration) -> Duration {
    env_var::<u64>(key)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

/// Parse a comma-separated environment variable into a vector.
///
/// Returns an empty vector if the variable is not set. Empty items are dropped.
pub fn env_list(key: &str) -> Vec<String> {
    std::env::var(key)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
