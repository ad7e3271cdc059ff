use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// A single value of an attribute sidecar.
///
/// Serialized untagged so an exported sidecar reads as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Interprets a raw string from an input file.
    ///
    /// Finite numbers become [`AttrValue::Number`], everything else stays text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<f64>() {
            Ok(x) if x.is_finite() => AttrValue::Number(x),
            _ => AttrValue::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(x) => Some(x.as_str()),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            AttrValue::Flag(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(x) => Some(x.as_slice()),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        AttrValue::Number(x)
    }
}

impl From<i64> for AttrValue {
    fn from(x: i64) -> Self {
        AttrValue::Number(x as f64)
    }
}

impl From<u32> for AttrValue {
    fn from(x: u32) -> Self {
        AttrValue::Number(x as f64)
    }
}

impl From<usize> for AttrValue {
    fn from(x: usize) -> Self {
        AttrValue::Number(x as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(x: bool) -> Self {
        AttrValue::Flag(x)
    }
}

impl From<&str> for AttrValue {
    fn from(x: &str) -> Self {
        AttrValue::Text(x.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(x: String) -> Self {
        AttrValue::Text(x)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(x: Vec<String>) -> Self {
        AttrValue::List(x.into_iter().map(AttrValue::Text).collect())
    }
}

/// Typed key-value sidecar attached to proteins and matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attrs(BTreeMap<String, AttrValue>);

impl Attrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts a raw string value, see [`AttrValue::parse`].
    pub fn insert_raw(&mut self, key: impl Into<String>, raw: &str) {
        self.0.insert(key.into(), AttrValue::parse(raw));
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(AttrValue::as_number)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_text)
    }

    pub fn get_flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttrValue::as_flag)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.remove(key)
    }

    pub fn extend(&mut self, other: Attrs) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
