//! The wire form of a [`Value`].
//!
//! An [`EncodedValue`] is a version tag followed by the base64 of the bincode
//! serialization of the value. Both processes share this module, so the format
//! stays stable across independently built client and server binaries.

use crate::types::Value;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Prefix of every encoded value produced by this version of the format.
pub const FORMAT_VERSION: &str = "rv1:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedValue(String);

impl EncodedValue {
    /// The sentinel for "no value".
    pub fn nil() -> Self {
        encode(&Value::Nil)
    }

    /// Wraps an already encoded string without checking it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn decode(&self) -> Result<Value, DecodingError> {
        decode(self)
    }
}

impl Default for EncodedValue {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Value> for EncodedValue {
    fn from(value: &Value) -> Self {
        encode(value)
    }
}

#[derive(Debug, Error)]
pub enum DecodingError {
    #[error("encoded value does not start with {:?}", FORMAT_VERSION)]
    MissingVersion,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid value payload: {0}")]
    Bincode(#[from] bincode::Error),
}

pub fn encode(value: &Value) -> EncodedValue {
    // Serializing an owned enum into a Vec only fails on a broken Serialize impl.
    let bytes = bincode::serialize(value).unwrap_or_default();
    EncodedValue(format!("{FORMAT_VERSION}{}", STANDARD.encode(bytes)))
}

pub fn decode(encoded: &EncodedValue) -> Result<Value, DecodingError> {
    let payload = encoded
        .0
        .strip_prefix(FORMAT_VERSION)
        .ok_or(DecodingError::MissingVersion)?;
    let bytes = STANDARD.decode(payload)?;
    Ok(bincode::deserialize(&bytes)?)
}
