//! Converted input values and the types they convert from.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Separator used when a list value is flattened into a single string.
pub const LIST_SEPARATOR: char = ';';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub field_name: String,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// A converted form or model value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Bool(bool),
    Date(NaiveDate),
    List(Vec<Value>),
    File(UploadedFile),
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Empty text and empty lists count as "no input" for required checks.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Single-string form as it would be written into an input element.
    pub fn to_input_string(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Date(date) => date.format(DATE_FORMAT).to_string(),
            Self::List(items) => items
                .iter()
                .map(Value::to_input_string)
                .collect::<Vec<_>>()
                .join(&LIST_SEPARATOR.to_string()),
            Self::File(file) => file.file_name.clone(),
        }
    }

    pub fn to_input_strings(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.iter().map(Value::to_input_string).collect(),
            other => vec![other.to_input_string()],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_input_string())
    }
}

/// Target type of a text-like field's converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Text,
    Integer,
    Decimal,
    Bool,
    Date,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Bool => "boolean",
            Self::Date => "date",
        }
    }

    /// Parse trimmed, non-empty input. Returns `None` when the text does not
    /// represent a value of this type.
    pub fn parse(self, raw: &str) -> Option<Value> {
        let raw = raw.trim();
        match self {
            Self::Text => Some(Value::Text(raw.to_string())),
            Self::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            Self::Decimal => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Value::Decimal),
            Self::Bool => parse_bool(raw).map(Value::Bool),
            Self::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .map(Value::Date),
        }
    }
}

pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_input() {
        assert_eq!(ValueType::Integer.parse(" 42 "), Some(Value::Integer(42)));
        assert_eq!(ValueType::Integer.parse("4x"), None);
        assert_eq!(ValueType::Bool.parse("on"), Some(Value::Bool(true)));
        assert_eq!(ValueType::Decimal.parse("NaN"), None);
        assert_eq!(
            ValueType::Date.parse("2024-02-29"),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(ValueType::Date.parse("2023-02-29"), None);
    }

    #[test]
    fn lists_flatten_with_separator() {
        let value = Value::List(vec![Value::text("a"), Value::Integer(2)]);
        assert_eq!(value.to_input_string(), "a;2");
        assert_eq!(value.to_input_strings(), vec!["a", "2"]);
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Bool(false).is_empty());
    }
}
