//! Scalar values stored in collections and read by validation rules

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One stored row, keyed by column name
pub type Row = BTreeMap<String, Value>;

/// A scalar column value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Text(String),
    Char(char),
    Null,
}

impl Value {
    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::Char(_) => "char",
            Self::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(c) => Some(*c),
            Self::Text(s) => single_char(s),
            _ => None,
        }
    }

    /// Compare two values of compatible kinds.
    ///
    /// `Null` is incomparable with everything, itself included. A `Char`
    /// compares with a one-character `Text`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Char(a), Self::Char(b)) => Some(a.cmp(b)),
            (Self::Char(a), Self::Text(b)) => single_char(b).map(|b| a.cmp(&b)),
            (Self::Text(a), Self::Char(b)) => single_char(a).map(|a| a.cmp(b)),
            _ => None,
        }
    }
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
            Self::Char(c) => write!(f, "{}", c),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Self::Char(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Integer(i) => serde_json::Value::from(i),
            Value::Text(s) => serde_json::Value::String(s),
            Value::Char(c) => serde_json::Value::String(c.to_string()),
            Value::Null => serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_same_kind() {
        assert_eq!(Value::from(35).compare(&Value::from(22)), Some(Ordering::Greater));
        assert_eq!(Value::from("Mike").compare(&Value::from("Mike")), Some(Ordering::Equal));
    }

    #[test]
    fn test_compare_char_with_text() {
        assert_eq!(Value::Char('M').compare(&Value::from("M")), Some(Ordering::Equal));
        assert_eq!(Value::Char('M').compare(&Value::from("Male")), None);
    }

    #[test]
    fn test_null_is_incomparable() {
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert_eq!(Value::from(1).compare(&Value::from("1")), None);
    }
}
