//! Typed field values and materialized records.

use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::Serialize;

/// Represents different types of field values in a record
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

/// One materialized, typed instance of a resource type.
///
/// Holds every declared field in declaration order (absent columns are
/// [`FieldValue::Null`]) plus the resolved identity. Immutable once built.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Record {
    resource_type: String,
    fields: IndexMap<String, FieldValue>,
    identity: FieldValue,
}

impl Record {
    pub(crate) fn new(
        resource_type: impl Into<String>,
        fields: IndexMap<String, FieldValue>,
        identity: FieldValue,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            fields,
            identity,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Value of a declared field; `None` if the field is not declared
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Whether `field` is declared and holds a non-null value
    pub fn is_populated(&self, field: &str) -> bool {
        self.get(field).is_some_and(|value| !value.is_null())
    }

    pub fn identity(&self) -> &FieldValue {
        &self.identity
    }

    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
