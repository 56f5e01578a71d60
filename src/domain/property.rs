use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Server-supplied metadata bag. The core never interprets it beyond a few
/// well-known keys (`simpleName`), it only has to round-trip it.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single metadata value.
///
/// Untagged so that arbitrary JSON maps straight onto it: `null`, booleans,
/// integers, floats, strings, arrays and nested objects. Integers are tried
/// before floats, so `3` stays `Integer(3)` across a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum PropertyValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            PropertyValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Render scalars as plain text (used for trace messages and labels).
    pub fn to_text(&self) -> Option<String> {
        match self {
            PropertyValue::Null => None,
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::Integer(i) => Some(i.to_string()),
            PropertyValue::Float(f) => Some(f.to_string()),
            PropertyValue::Text(s) => Some(s.clone()),
            PropertyValue::List(_) | PropertyValue::Map(_) => serde_json::to_string(self).ok(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Integer(i)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}
