//! Tagged cache payload.
//!
//! The shape of a value is chosen when it is written and travels with it, so
//! a reader never has to guess whether `"true"` was a flag or a word.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::{CacheError, Result};

/// A value stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CachedValue {
    Bool(bool),
    Text(String),
    /// Mappings and sequences, stored as canonical JSON.
    Json(Value),
}

impl CachedValue {
    /// Builds a structured value from anything serializable.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(CachedValue::Json)
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Encodes the value for a text-based remote store.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    /// Decodes a value read from a remote store.
    ///
    /// Text that is not an encoded `CachedValue` (written by another client,
    /// or by hand) is returned verbatim as [`CachedValue::Text`].
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| CachedValue::Text(raw.to_string()))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CachedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CachedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            CachedValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Deserializes the payload into a concrete type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            CachedValue::Bool(b) => Value::Bool(*b),
            CachedValue::Text(s) => Value::String(s.clone()),
            CachedValue::Json(v) => v.clone(),
        };
        serde_json::from_value(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}

impl From<bool> for CachedValue {
    fn from(value: bool) -> Self {
        CachedValue::Bool(value)
    }
}

impl From<String> for CachedValue {
    fn from(value: String) -> Self {
        CachedValue::Text(value)
    }
}

impl From<&str> for CachedValue {
    fn from(value: &str) -> Self {
        CachedValue::Text(value.to_string())
    }
}

impl From<Value> for CachedValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => CachedValue::Bool(b),
            Value::String(s) => CachedValue::Text(s),
            other => CachedValue::Json(other),
        }
    }
}
