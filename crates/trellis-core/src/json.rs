//! # JSON Helpers
//!
//! simd-json parsing for inbound payloads with serde_json for serialization.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string into a typed value
///
/// # Errors
///
/// Returns [`Error::Payload`] when the input is not valid JSON.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse mutable JSON bytes into a typed value
///
/// simd-json parses in place, which is why the slice is mutable.
///
/// # Errors
///
/// Returns [`Error::Payload`] when the input is not valid JSON.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::Payload {
        reason: e.to_string(),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns [`Error::Json`] when serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
