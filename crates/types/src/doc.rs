//! Document model.
//!
//! A document is an arbitrary JSON object keyed by the reserved `_id`
//! attribute and versioned by the reserved `_rev` attribute. All other
//! fields are opaque to the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InvalidPayloadSnafu, Result};

/// Reserved primary-key attribute.
pub const ID_FIELD: &str = "_id";

/// Reserved revision attribute.
pub const REV_FIELD: &str = "_rev";

/// A JSON document: a mapping from attribute name to arbitrary JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => InvalidPayloadSnafu {
                message: format!("document must be a JSON object, got {}", type_name(&other)),
            }
            .fail(),
        }
    }

    /// Consumes the document into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// The `_id` attribute, when present and a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// The `_rev` attribute, when present and a string.
    pub fn rev(&self) -> Option<&str> {
        self.0.get(REV_FIELD).and_then(Value::as_str)
    }

    /// True when the named attribute exists, regardless of its type.
    pub fn has_field(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Forces the `_id` attribute.
    pub fn set_id(&mut self, id: &str) {
        self.0.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }

    /// Forces the `_rev` attribute.
    pub fn set_rev(&mut self, rev: &str) {
        self.0.insert(REV_FIELD.to_string(), Value::String(rev.to_string()));
    }

    /// Reads an arbitrary attribute.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Sets an arbitrary attribute.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Key-wise object overlay: every field of `input` wins, fields of
    /// `existing` with no counterpart in `input` are preserved.
    pub fn overlay(existing: &Document, input: Document) -> Document {
        let mut merged = existing.0.clone();
        for (key, value) in input.0 {
            merged.insert(key, value);
        }
        Document(merged)
    }

    /// Serializes to the stored UTF-8 JSON form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    /// Deserializes from the stored UTF-8 JSON form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self(serde_json::from_slice(bytes)?))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
