//! # Option Merge Engine
//!
//! Append-only merging of multiselect option sets. An option, once assigned
//! a remote id, keeps that id forever; merging only ever appends newly
//! observed names with freshly minted ids. Re-running a merge with the same
//! inputs is a no-op, which lets the schema synchronizer skip remote
//! updates entirely when nothing changed.

use crate::model::FieldOption;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Merge newly observed option names into an existing option set.
///
/// The result starts as a verbatim copy of `existing` in original order;
/// each name in `new_values` that is not already known (in `existing` or
/// added earlier in this call) is appended with a freshly minted id. Returns
/// the merged list and the number of options added.
///
/// Malformed existing entries (empty id or empty name) are preserved
/// verbatim in the output but do not participate in deduplication.
pub fn merge_options(
    existing: &[FieldOption],
    new_values: &[String],
) -> (Vec<FieldOption>, usize) {
    let mut known: BTreeSet<&str> = existing
        .iter()
        .filter(|option| !option.id.is_empty() && !option.name.is_empty())
        .map(|option| option.name.as_str())
        .collect();

    let mut merged = existing.to_vec();
    let mut added = 0;

    for name in new_values {
        if name.is_empty() || known.contains(name.as_str()) {
            continue;
        }
        merged.push(FieldOption::new(mint_option_id(), name.clone()));
        known.insert(name.as_str());
        added += 1;
    }

    (merged, added)
}

/// Mint a fresh unique option identifier.
pub fn mint_option_id() -> String {
    Uuid::new_v4().simple().to_string()
}
