//! Environment Configuration Helpers
//!
//! Every runtime setting is read from the process environment (optionally
//! seeded from `.env` by the binary). Malformed values never abort startup:
//! they are logged and replaced by the default.

use std::fmt::Display;
use std::str::FromStr;

/// Read `key`, falling back to `default` when unset or empty
pub fn env_or(key: &str, default: &str) -> String {
    non_empty(std::env::var(key).ok()).unwrap_or_else(|| default.to_string())
}

/// Read and parse `key`, falling back to `default` when unset, empty or invalid
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or(key, std::env::var(key).ok(), default)
}

/// Read a boolean flag (`1`/`true`/`yes`/`on` and their negatives)
pub fn env_flag(key: &str, default: bool) -> bool {
    match non_empty(std::env::var(key).ok()) {
        None => default,
        Some(raw) => parse_flag(&raw).unwrap_or_else(|| {
            tracing::warn!(key, value = %raw, default, "Invalid boolean, using default");
            default
        }),
    }
}

/// Interpret a flag value, `None` when it is neither truthy nor falsy
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = non_empty(raw) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, default = %default, "Invalid value, using default");
            default
        }
    }
}
