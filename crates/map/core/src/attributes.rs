//! Sparse per-item attribute storage.
//!
//! Most items on a map carry nothing beyond their type id and subtype; the
//! attribute store exists only for the minority that do ("complex" items).
//! Keys are a small fixed vocabulary plus room for generic typed values.
//! Absent keys always read as semantic defaults, never as errors.

use std::collections::HashMap;

/// Well-known attribute keys.
pub mod keys {
    /// Unique id, referenced by quest scripts.
    pub const UID: &str = "uid";
    /// Action id, referenced by server actions.
    pub const AID: &str = "aid";
    /// Upgrade tier.
    pub const TIER: &str = "tier";
    /// Text written on the item.
    pub const TEXT: &str = "text";
    /// Special description overriding the type's.
    pub const DESC: &str = "desc";
}

/// A single tagged attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Int(i32),
    Double(f64),
    Bool(bool),
    String(String),
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

/// Key/value map of non-default item properties.
///
/// Owned exclusively by its item; cloning an item's store during deep copy
/// yields a fully independent map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemAttributes {
    values: HashMap<String, AttributeValue>,
}

impl ItemAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.values.remove(key)
    }

    /// Integer read with a zero default. A key holding a non-integer value
    /// also reads as zero; type confusion is treated like absence.
    pub fn get_int(&self, key: &str) -> i32 {
        match self.values.get(key) {
            Some(AttributeValue::Int(v)) => *v,
            _ => 0,
        }
    }

    pub fn get_double(&self, key: &str) -> f64 {
        match self.values.get(key) {
            Some(AttributeValue::Double(v)) => *v,
            _ => 0.0,
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        match self.values.get(key) {
            Some(AttributeValue::Bool(v)) => *v,
            _ => false,
        }
    }

    /// String read with an empty-string default.
    pub fn get_str(&self, key: &str) -> &str {
        match self.values.get(key) {
            Some(AttributeValue::String(v)) => v,
            _ => "",
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
