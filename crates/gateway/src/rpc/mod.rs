//! Typed wrappers over gateway RPCs used by the shell's settings and
//! diagnostics panels.
//!
//! Results keep unknown fields in a flattened `extra` map so newer gateways
//! don't lose data on the way through.

pub mod config;
pub mod diagnostics;
pub mod sessions;

use serde::de::DeserializeOwned;

use crate::error::Result;

/// Decode a payload, treating `null` as an empty object.
fn decode<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T> {
    let payload = if payload.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        payload
    };
    Ok(serde_json::from_value(payload)?)
}
