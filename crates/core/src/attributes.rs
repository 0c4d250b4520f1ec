//! Image attribute values and their normalization.
//!
//! Extractors hand back [`RawValue`]s, which can carry byte strings, rationals
//! and non-finite floats. Only [`AttributeValue`]s are ever written to the
//! record store; [`normalize`] is the single, total conversion between them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute map stored on a record, keyed by tag name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A JSON-safe attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Sequence(Vec<AttributeValue>),
    Mapping(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Integer(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// A tag value as produced by an extractor, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bytes(Vec<u8>),
    Text(String),
    Integer(i64),
    Float(f64),
    Rational { num: i64, den: i64 },
    Sequence(Vec<RawValue>),
    Mapping(Vec<(String, RawValue)>),
    /// A value the extractor has no model for, already rendered as text.
    Other(String),
}

/// Converts a raw tag value into its storable form. Never fails.
pub fn normalize(raw: &RawValue) -> AttributeValue {
    match raw {
        RawValue::Bytes(bytes) => AttributeValue::Text(decode_bytes(bytes)),
        RawValue::Text(s) => AttributeValue::Text(s.clone()),
        RawValue::Integer(v) => AttributeValue::Integer(*v),
        RawValue::Float(v) => float_value(*v),
        RawValue::Rational { num, den } => {
            if *den == 0 {
                AttributeValue::Text(format!("{num}/{den}"))
            } else {
                float_value(*num as f64 / *den as f64)
            }
        }
        RawValue::Sequence(items) => AttributeValue::Sequence(items.iter().map(normalize).collect()),
        RawValue::Mapping(entries) => AttributeValue::Mapping(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), normalize(value)))
                .collect(),
        ),
        RawValue::Other(text) => AttributeValue::Text(text.clone()),
    }
}

/// Normalizes every entry of an extracted tag map.
pub fn normalize_map(raw: &BTreeMap<String, RawValue>) -> Attributes {
    raw.iter()
        .map(|(key, value)| (key.clone(), normalize(value)))
        .collect()
}

fn float_value(v: f64) -> AttributeValue {
    if v.is_finite() {
        AttributeValue::Float(v)
    } else {
        AttributeValue::Text(v.to_string())
    }
}

fn decode_bytes(bytes: &[u8]) -> String {
    let decoded = String::from_utf8_lossy(bytes);
    let trimmed = decoded.trim_end_matches('\0');
    if trimmed.is_empty() && !bytes.is_empty() {
        // all padding; keep something visible instead of an empty string
        format!("<{} bytes>", bytes.len())
    } else {
        trimmed.to_string()
    }
}
