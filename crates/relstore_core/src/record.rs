//! Engine-agnostic record representation.
//!
//! # Responsibility
//! - Define the scalar value model shared by callers and engines.
//! - Keep records free of any engine-native types.
//!
//! # Invariants
//! - `RecordId` values are engine-assigned and never reused.
//! - A `Record` never carries engine-specific value kinds (blobs, etc.).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Surrogate primary-key value assigned by the engine on insert.
pub type RecordId = i64;

/// One logical entity instance: field name to scalar value.
pub type Record = BTreeMap<String, Value>;

/// Scalar value carried by a record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    /// Human-readable value kind used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
