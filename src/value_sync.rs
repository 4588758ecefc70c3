//! # Value Builder
//!
//! Converts one user's raw attribute map into typed value records using the
//! per-pass cache. Failures are attribute-scoped: an attribute that cannot
//! be resolved or formatted is logged and skipped, never the whole user.

use crate::cache::FieldCache;
use crate::error::SyncError;
use crate::model::{AttributeRecord, Value, ValueRecord};
use tracing::warn;

/// Build the value records for one user. The returned list may be empty if
/// every attribute failed or only the identity field was present.
pub fn build_values(
    record: &AttributeRecord,
    cache: &mut dyn FieldCache,
    identity_field: &str,
) -> Vec<ValueRecord> {
    let mut values = Vec::with_capacity(record.attributes.len());

    for (name, value) in &record.attributes {
        if name == identity_field {
            continue;
        }

        let field_id = match cache.field_id(name) {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(
                    field = %name,
                    identity = %record.identity,
                    "unknown field, skipping attribute"
                );
                continue;
            }
            Err(err) => {
                warn!(
                    field = %name,
                    identity = %record.identity,
                    error = %err,
                    "field lookup failed, skipping attribute"
                );
                continue;
            }
        };

        match format_value(name, value, cache) {
            Ok(encoded) => values.push(ValueRecord {
                field_id,
                value: encoded,
            }),
            Err(err) => {
                warn!(
                    field = %name,
                    identity = %record.identity,
                    error = %err,
                    "skipping attribute"
                );
            }
        }
    }

    values
}

/// Encode one attribute value by its runtime shape: lists become arrays of
/// resolved option ids, scalars become JSON string literals (text and date
/// are stored identically).
fn format_value(
    field: &str,
    value: &Value,
    cache: &mut dyn FieldCache,
) -> Result<serde_json::Value, SyncError> {
    match value {
        Value::Text(s) => Ok(serde_json::Value::String(s.clone())),
        Value::List(names) => {
            let mut option_ids = Vec::with_capacity(names.len());
            for name in names {
                let id = cache
                    .option_id(field, name)
                    .map_err(|err| SyncError::ValueFormat {
                        field: field.to_string(),
                        reason: format!("option lookup failed for {name:?}: {err}"),
                    })?
                    .filter(|id| !id.is_empty());
                match id {
                    Some(id) => option_ids.push(serde_json::Value::String(id)),
                    None => {
                        return Err(SyncError::ValueFormat {
                            field: field.to_string(),
                            reason: format!("unknown option {name:?}"),
                        })
                    }
                }
            }
            Ok(serde_json::Value::Array(option_ids))
        }
        Value::Null => Err(SyncError::ValueFormat {
            field: field.to_string(),
            reason: "unsupported value shape: null".to_string(),
        }),
    }
}
