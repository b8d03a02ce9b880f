//! Call options passed to handlers.
use std::fmt;

use indexmap::IndexMap;

use crate::errors::{ConnectorError, Result};

/// A single option value.
///
/// Values written into an address are plain text. They're interpreted as
/// literals where possible so that `drop=true` is a boolean and `skip=3` an
/// integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Interpret text as a boolean or integer literal, keeping it as a string
    /// otherwise.
    pub fn parse_literal(s: &str) -> Self {
        if s.eq_ignore_ascii_case("true") {
            return OptionValue::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return OptionValue::Bool(false);
        }
        match s.parse::<i64>() {
            Ok(v) => OptionValue::Int(v),
            Err(_) => OptionValue::Str(s.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

/// Insertion ordered set of named options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    values: IndexMap<String, OptionValue>,
}

impl OptionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert an option, returning the value it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<OptionValue>,
    ) -> Option<OptionValue> {
        self.values.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<OptionValue> {
        self.values.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overlay `other` on top of self. Values in `other` win.
    pub fn merge(&mut self, other: &OptionMap) {
        for (name, value) in other.values.iter() {
            self.values.insert(name.clone(), value.clone());
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(OptionValue::Bool(v)) => Ok(Some(*v)),
            Some(other) => Err(unexpected_type(name, "bool", other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<Option<i64>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(OptionValue::Int(v)) => Ok(Some(*v)),
            Some(other) => Err(unexpected_type(name, "int", other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<Option<&str>> {
        match self.values.get(name) {
            None => Ok(None),
            Some(OptionValue::Str(v)) => Ok(Some(v.as_str())),
            Some(other) => Err(unexpected_type(name, "string", other)),
        }
    }
}

fn unexpected_type(name: &str, expected: &str, got: &OptionValue) -> ConnectorError {
    ConnectorError::Validation(format!(
        "Option '{name}' expected a {expected} value, got {} '{got}'",
        got.type_name()
    ))
}

impl<K, V> FromIterator<(K, V)> for OptionMap
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = OptionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
