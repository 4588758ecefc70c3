//! # Data Model
//!
//! Core data structures for attribute synchronization: raw records as read
//! from the external source, field schema descriptions, and the encoded
//! value records pushed to the remote attribute store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single attribute value as it arrives from the external source.
///
/// The shape is decided once, at the deserialization boundary; the rest of
/// the pipeline matches on these variants instead of inspecting dynamic
/// maps. `Null` means "unknown" — it never clears remote state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Scalar string (covers both text and date fields).
    Text(String),
    /// Ordered list of option names for a multiselect field.
    List(Vec<String>),
    /// Present-but-unknown value.
    Null,
}

impl Value {
    /// Whether this value carries no usable data.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One user's attribute data for one sync batch.
///
/// `identity` is the external user key (e.g. an email) used only to resolve
/// the record to a remote user; it is never synchronized as a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub identity: String,
    pub attributes: BTreeMap<String, Value>,
}

impl AttributeRecord {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Remote field type. Assigned once at field creation and immutable
/// thereafter — re-inference never changes an existing field's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Date,
    Multiselect,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Date => write!(f, "date"),
            FieldType::Multiselect => write!(f, "multiselect"),
        }
    }
}

/// One allowed value of a multiselect field.
///
/// The `(name, id)` pairing is stable for the life of the field; option
/// sets only ever grow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: String,
    pub name: String,
}

impl FieldOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A field as known by the remote attribute store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteField {
    pub id: String,
    /// Display name shown remotely, derived from the external name.
    pub name: String,
    pub field_type: FieldType,
    /// Options for multiselect fields; empty for plain fields.
    pub options: Vec<FieldOption>,
}

/// A field creation request. The remote store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub name: String,
    pub field_type: FieldType,
    pub options: Vec<FieldOption>,
    /// Remote visibility attribute (synced fields are typically hidden).
    pub visibility: String,
    /// Remote managed attribute (prevents edits that would fight the sync).
    pub managed: String,
}

/// One encoded attribute value for one user, ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub field_id: String,
    /// JSON fragment: a string literal for text/date, an array of option
    /// ids for multiselect.
    pub value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_null_detection() {
        assert!(Value::Null.is_null());
        assert!(!Value::Text("x".to_string()).is_null());
        assert!(!Value::List(vec![]).is_null());
    }

    #[test]
    fn test_value_deserializes_untagged() {
        let text: Value = serde_json::from_str("\"Engineering\"").unwrap();
        assert_eq!(text, Value::Text("Engineering".to_string()));

        let list: Value = serde_json::from_str("[\"X\",\"Y\"]").unwrap();
        assert_eq!(list, Value::List(vec!["X".to_string(), "Y".to_string()]));

        let null: Value = serde_json::from_str("null").unwrap();
        assert_eq!(null, Value::Null);
    }

    #[test]
    fn test_record_builder() {
        let record = AttributeRecord::new("a@x.com")
            .with_attribute("dept", Value::Text("Eng".to_string()))
            .with_attribute("tags", Value::List(vec!["X".to_string()]));

        assert_eq!(record.identity, "a@x.com");
        assert_eq!(record.attributes.len(), 2);
        assert_eq!(
            record.attributes.get("dept"),
            Some(&Value::Text("Eng".to_string()))
        );
    }

    #[test]
    fn test_record_deserializes_from_provider_shape() {
        let json =
            r#"{"identity":"a@x.com","attributes":{"dept":"Eng","tags":["X","Y"],"notes":null}}"#;
        let record: AttributeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.identity, "a@x.com");
        assert_eq!(record.attributes.get("notes"), Some(&Value::Null));
    }
}
