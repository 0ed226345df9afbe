//! Environment variable loading.
//!
//! `.env` values are loaded into the process environment by the binary before
//! anything here runs, so real environment variables win over `.env`.

use std::env;
use std::time::Duration;

use crate::errors::{BridgeError, BridgeResult};

pub(crate) const API_KEY_VAR: &str = "DASHSCOPE_API_KEY";
pub(crate) const CONNECT_TIMEOUT_VAR: &str = "BRIDGE_CONNECT_TIMEOUT_MS";
pub(crate) const GATE_TIMEOUT_VAR: &str = "BRIDGE_GATE_TIMEOUT_MS";
pub(crate) const FINISH_TIMEOUT_VAR: &str = "BRIDGE_FINISH_TIMEOUT_MS";
pub(crate) const FORWARD_RAW_VAR: &str = "BRIDGE_FORWARD_RAW";

/// Read a variable, treating unset and blank values alike.
pub(crate) fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Millisecond duration variable.
pub(crate) fn duration_ms(name: &str) -> BridgeResult<Option<Duration>> {
    var(name)
        .map(|raw| {
            raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                BridgeError::InvalidConfig(format!(
                    "{name} must be a whole number of milliseconds, got '{raw}'"
                ))
            })
        })
        .transpose()
}

/// Boolean variable. Accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub(crate) fn flag(name: &str) -> BridgeResult<Option<bool>> {
    var(name)
        .map(|raw| parse_bool(&raw).ok_or_else(|| {
            BridgeError::InvalidConfig(format!("{name} must be true or false, got '{raw}'"))
        }))
        .transpose()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
