//! Flat metadata container and the enhanced metadata collector.
//!
//! Vector payloads must be flat: string keys mapped to scalars or lists of strings,
//! never nested objects. [`FlatMetadata`] makes that shape unrepresentable to violate
//! rather than validated after the fact; building arrays are flattened to
//! `building_{i}_{field}` keys at collection time. Scalar values are stringified on
//! write, booleans excepted, so numeric inserts land in the index as text.

pub mod collector;
pub mod flatten;

pub use collector::{CollectError, MetadataCollector};
pub use flatten::{flatten_buildings, flatten_pluto};

use std::collections::BTreeMap;

use serde::Serialize;

/// A scalar or string-list payload value.
///
/// Numbers are deliberately unrepresentable: the `From` conversions stringify them,
/// so every scalar except booleans reaches the index as text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// UTF-8 text, including stringified numeric scalars.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Homogeneous list of strings.
    TextList(Vec<String>),
}

impl MetadataValue {
    /// Borrow the text payload, when this value is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the value is empty (empty string or empty list).
    fn is_empty(&self) -> bool {
        match self {
            Self::Text(value) => value.trim().is_empty(),
            Self::TextList(values) => values.is_empty(),
            Self::Bool(_) => false,
        }
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(value: Vec<String>) -> Self {
        Self::TextList(value)
    }
}

/// Flat string-to-scalar mapping stored alongside each vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FlatMetadata(BTreeMap<String, MetadataValue>);

impl FlatMetadata {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, dropping empty strings and empty lists.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetadataValue>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.0.insert(key.into(), value);
    }

    /// Insert an optional text value; `None` and empty strings are dropped.
    pub fn insert_opt(&mut self, key: impl Into<String>, value: Option<String>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    /// Whether the mapping contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetadataValue)> {
        self.0.iter()
    }

    /// Merge `other` into `self`; colliding keys take the incoming value.
    pub fn extend(&mut self, other: FlatMetadata) {
        self.0.extend(other.0);
    }

    /// Serialize to the JSON object shape expected by the index.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(key, value)| {
                let json = serde_json::to_value(value).expect("metadata values serialize");
                (key.clone(), json)
            })
            .collect()
    }
}
