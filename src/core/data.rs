//! Data types for decoded register fields.
//!
//! This module defines the value model shared by the codec and the connector.
//! The register layer is purely numeric: every field kind decodes to either an
//! integer or a float. Typed application views (units, scaling, enumerations)
//! belong to the model-access layer on top of the connector, not here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A decoded register value.
///
/// `U16`, `I32` and `I64` fields decode to [`Value::Integer`]; `F32` and `F64`
/// fields decode to [`Value::Float`]. `F32` payloads are widened to `f64`,
/// which is lossless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Integer value (signed 64-bit carrier).
    Integer(i64),

    /// Floating-point value (64-bit carrier).
    Float(f64),
}

impl Value {
    /// Try to get the value as i64.
    ///
    /// Floats are truncated toward zero; `None` only for non-finite floats.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
        }
    }

    /// Get the value as f64.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    /// True if this value is an integer variant.
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

/// A set of named field values.
///
/// Produced by a poll cycle (every schema field, decoded) and consumed by
/// [`write`](crate::connector::ModbusConnector::write) (any subset of fields;
/// fields absent from the map keep whatever the register image currently
/// holds). Iteration order is the lexicographic field-name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMap {
    fields: BTreeMap<String, Value>,
}

impl FieldMap {
    /// Create an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field value, replacing any previous value for the name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Number of fields in the map.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another map into this one, overwriting common names.
    pub fn merge(&mut self, other: FieldMap) {
        self.fields.extend(other.fields);
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
