//! Typed attribute values attached to entities.

use serde::{Deserialize, Serialize};

/// A single typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Nested or otherwise unclassified payloads.
    Json(serde_json::Value),
}

impl AttributeValue {
    /// Best-effort conversion from an arbitrary JSON value.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Json(serde_json::Value::Number(n))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}
