//! Criteria normalization.
//!
//! Converts the raw `ResourceProperties` mapping into typed criteria. All
//! checks here run before the first provider call.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Coerce a `"true"`/`"false"` string (any case) into a JSON boolean.
///
/// Any other value comes back unchanged; it only becomes an error where a
/// boolean is actually required.
pub fn coerce_bool(value: &Value) -> Value {
    match value {
        Value::String(s) if s.eq_ignore_ascii_case("true") => Value::Bool(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Value::Bool(false),
        other => other.clone(),
    }
}

/// Raw property mapping of a single invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Map<String, Value>);

impl Properties {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build from an event's `ResourceProperties`. A missing mapping is empty.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            _ => Err(ValidationError::NotAMapping),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Scalar rendered as a string, used for physical resource ids.
    pub fn display(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(|v| scalar_string(key, v).ok())
    }

    pub fn required_str(&self, key: &str) -> Result<String> {
        self.optional_str(key)?
            .ok_or_else(|| ValidationError::Missing(key.to_string()))
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<String>> {
        self.0.get(key).map(|v| scalar_string(key, v)).transpose()
    }

    /// Like [`Properties::optional_str`], but a blank value is rejected.
    pub fn non_empty_str(&self, key: &str) -> Result<Option<String>> {
        match self.optional_str(key)? {
            Some(s) if s.trim().is_empty() => Err(ValidationError::Empty(key.to_string())),
            other => Ok(other),
        }
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.0.get(key).map(coerce_bool) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(_) => Err(ValidationError::NotBoolean(key.to_string())),
        }
    }

    pub fn optional_regex(&self, key: &str) -> Result<Option<Regex>> {
        let Some(pattern) = self.optional_str(key)? else {
            return Ok(None);
        };
        Regex::new(&pattern)
            .map(Some)
            .map_err(|source| ValidationError::InvalidRegex {
                property: key.to_string(),
                source,
            })
    }

    pub fn optional_array(&self, key: &str) -> Result<Option<&Vec<Value>>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(ValidationError::NotArray(key.to_string())),
        }
    }

    pub fn optional_string_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        let Some(items) = self.optional_array(key)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|v| scalar_string(key, v))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Array whose elements must all be key/value objects.
    pub fn optional_object_list(&self, key: &str) -> Result<Option<Vec<&Map<String, Value>>>> {
        let Some(items) = self.optional_array(key)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|v| {
                v.as_object()
                    .ok_or_else(|| ValidationError::NotKeyValue(key.to_string()))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// `[{Key, Value}, ...]` parsed into a [`TagSet`].
    pub fn optional_tags(&self, key: &str) -> Result<Option<TagSet>> {
        let Some(objects) = self.optional_object_list(key)? else {
            return Ok(None);
        };
        let mut tags = TagSet::default();
        for object in objects {
            let Some(Value::String(tag_key)) = object.get("Key") else {
                return Err(ValidationError::NotKeyValue(key.to_string()));
            };
            let value = object.get("Value").cloned().unwrap_or(Value::Null);
            tags.insert(tag_key.clone(), value);
        }
        Ok(Some(tags))
    }

    /// Fails unless at least one of `keys` is present.
    pub fn require_identity(&self, keys: &[&str]) -> Result<()> {
        if keys.iter().any(|k| self.0.contains_key(*k)) {
            Ok(())
        } else {
            Err(ValidationError::NoIdentity(
                keys.iter().map(|k| k.to_string()).collect(),
            ))
        }
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn scalar_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(ValidationError::NotString(key.to_string())),
    }
}

/// Tag collection with mapping semantics.
///
/// Two sets are equal when they hold the same keys with structurally equal
/// values; entry order never matters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet(BTreeMap<String, Value>);

impl TagSet {
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Value::String(v.into())))
                .collect(),
        )
    }
}
