//! # Type Inference
//!
//! Infers remote field types from sample values and derives display names
//! from external field names. Inference runs once, at field creation time;
//! an existing field's type is never revisited.

use crate::model::{FieldType, Value};
use regex::Regex;
use std::sync::LazyLock;

/// Matches ISO 8601 dates in `YYYY-MM-DD` form. Month-specific day limits
/// are not validated, so Feb 30 matches — accepted imprecision.
static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid date regex")
});

/// Infer the remote field type from a sample value.
///
/// Lists are multiselect, strings in `YYYY-MM-DD` form are dates, and
/// everything else is text. A null sample yields `Text` as a safe default,
/// though discovery normally filters nulls out before inference.
pub fn infer_field_type(sample: &Value) -> FieldType {
    match sample {
        Value::List(_) => FieldType::Multiselect,
        Value::Text(s) if DATE_PATTERN.is_match(s) => FieldType::Date,
        Value::Text(_) | Value::Null => FieldType::Text,
    }
}

/// Derive a human-readable display name from an external field name.
///
/// Splits on underscores and hyphens, uppercases the first character of
/// each word, and joins with single spaces: `security_clearance` becomes
/// `Security Clearance`, `start-date` becomes `Start Date`.
pub fn to_display_name(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
