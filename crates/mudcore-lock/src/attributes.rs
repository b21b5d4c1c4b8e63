//! Loosely typed key/value attributes that lock functions can inspect.
//!
//! Real persistence lives outside the core. This is just the typed
//! view lock functions need: look a key up, compare it to a literal.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Numeric view of the value, if it has one. Text is parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    /// Whether `<`/`>` comparisons mean anything for this value.
    /// Booleans only support equality.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Self::Bool(_))
    }

    /// Compares this value against a literal taken from a lock-string.
    ///
    /// When both sides read as numbers the comparison is numeric,
    /// otherwise it falls back to comparing the text forms. Booleans
    /// have no order: they compare against `true`/`false`
    /// case-insensitively and answer `None` for any other literal.
    pub fn compare_literal(&self, literal: &str) -> Option<Ordering> {
        let literal = literal.trim();
        if let Self::Bool(b) = self {
            return match literal.to_ascii_lowercase().as_str() {
                "true" => Some(if *b { Ordering::Equal } else { Ordering::Less }),
                "false" => Some(if *b { Ordering::Greater } else { Ordering::Equal }),
                _ => None,
            };
        }
        if let (Some(lhs), Ok(rhs)) = (self.as_f64(), literal.parse::<f64>()) {
            return lhs.partial_cmp(&rhs);
        }
        Some(self.to_string().as_str().cmp(literal))
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for AttrValue {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Attribute storage keyed by case-insensitive name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    values: BTreeMap<String, AttrValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or overwrites) an attribute.
    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.values.insert(key.trim().to_lowercase(), value.into());
    }

    /// Looks an attribute up.
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.values.get(&key.trim().to_lowercase())
    }

    /// Looks an attribute up, falling back to `default`.
    pub fn get_or(&self, key: &str, default: AttrValue) -> AttrValue {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Removes an attribute, returning its old value.
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.values.remove(&key.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
