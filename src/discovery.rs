//! # Field Discovery
//!
//! Scans a batch of attribute records and derives the set of fields that
//! need to exist remotely, together with a sample value per field for type
//! inference. Discovery makes the schema self-describing: different users
//! may carry different subsets of fields, and the union is what gets
//! created.

use crate::model::{AttributeRecord, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Discover all field names present across a batch of records.
///
/// Returns the union of field names seen across all records, excluding the
/// identity field, each with the first non-null sample value encountered in
/// record-scan order. A field that is null in every record is not
/// discovered — its type cannot be inferred, so it is silently skipped and
/// may be picked up by a later batch.
pub fn discover_fields(
    records: &[AttributeRecord],
    identity_field: &str,
) -> BTreeMap<String, Value> {
    let mut fields = BTreeMap::new();

    for record in records {
        for (name, value) in &record.attributes {
            if name == identity_field {
                continue;
            }
            if value.is_null() {
                continue;
            }
            fields
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    fields
}

/// Collect the deduplicated option names observed for one multiselect field
/// across the whole batch, in first-seen order.
///
/// Scalar and null values for the field are ignored; only list values
/// contribute option names.
pub fn collect_option_names(
    records: &[AttributeRecord],
    field: &str,
    identity_field: &str,
) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();

    if field == identity_field {
        return names;
    }

    for record in records {
        if let Some(Value::List(values)) = record.attributes.get(field) {
            for value in values {
                if seen.insert(value.clone()) {
                    names.push(value.clone());
                }
            }
        }
    }

    names
}
