//! # Field Schema Synchronizer
//!
//! Ensures every field discovered in a batch (and, for multiselect fields,
//! every observed option) exists remotely, minimizing remote calls. Field
//! failures degrade gracefully: a field that cannot be created or recovered
//! is logged and left out of the returned mapping, and value building skips
//! it; the rest of the schema still syncs.

use crate::cache::FieldCache;
use crate::config::SyncConfig;
use crate::discovery::{collect_option_names, discover_fields};
use crate::error::SyncError;
use crate::infer::{infer_field_type, to_display_name};
use crate::merge::merge_options;
use crate::model::{AttributeRecord, FieldOption, FieldType, NewField, Value};
use crate::remote::RemoteStore;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Result of one schema pass: the external-name → remote-id mapping for
/// every field that succeeded, and the names of fields that failed
/// entirely.
#[derive(Debug, Default)]
pub struct SchemaOutcome {
    pub mapping: BTreeMap<String, String>,
    pub failed: Vec<String>,
}

impl SchemaOutcome {
    /// True when fields were discovered but not a single one could be
    /// mapped — the signature of a schema API that is down rather than of
    /// scattered per-field problems.
    pub fn is_total_failure(&self) -> bool {
        self.mapping.is_empty() && !self.failed.is_empty()
    }
}

/// Drives field discovery, type inference, option merging, and remote
/// schema mutation for one batch.
pub struct FieldSynchronizer<'a> {
    remote: &'a mut dyn RemoteStore,
    cache: &'a mut dyn FieldCache,
    config: &'a SyncConfig,
}

impl<'a> FieldSynchronizer<'a> {
    pub fn new(
        remote: &'a mut dyn RemoteStore,
        cache: &'a mut dyn FieldCache,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            remote,
            cache,
            config,
        }
    }

    /// Ensure every discovered field exists remotely. Runs once per batch,
    /// not per user.
    pub fn sync_fields(&mut self, records: &[AttributeRecord]) -> SchemaOutcome {
        let discovered = discover_fields(records, &self.config.identity_field);
        info!(field_count = discovered.len(), "synchronizing field schema");

        let mut outcome = SchemaOutcome::default();

        for (name, sample) in &discovered {
            match self.sync_one_field(name, sample, records) {
                Ok(field_id) => {
                    outcome.mapping.insert(name.clone(), field_id);
                }
                Err(err) => {
                    warn!(field = %name, error = %err, "field failed to sync, skipping field");
                    outcome.failed.push(name.clone());
                }
            }
        }

        if !outcome.failed.is_empty() {
            warn!(
                failed_count = outcome.failed.len(),
                failed_fields = ?outcome.failed,
                "some fields failed to sync"
            );
        }
        info!(
            mapped = outcome.mapping.len(),
            failed = outcome.failed.len(),
            "field schema synchronized"
        );

        outcome
    }

    /// Returns the remote field id on success, or the classified failure
    /// when the field could not be mapped this pass.
    fn sync_one_field(
        &mut self,
        name: &str,
        sample: &Value,
        records: &[AttributeRecord],
    ) -> Result<String, SyncError> {
        // A cache lookup failure is not fatal for the field: fall through
        // to the creation path, which recovers via the fallback search if
        // the field actually exists.
        let known_id = match self.cache.field_id(name) {
            Ok(id) => id,
            Err(err) => {
                let err = SyncError::CacheBackingStore {
                    field: name.to_string(),
                    source: err,
                };
                warn!(field = %name, error = %err, "cache lookup failed, attempting creation");
                None
            }
        };

        if let Some(field_id) = known_id {
            if infer_field_type(sample) == FieldType::Multiselect {
                self.ensure_options(name, &field_id, records);
            }
            return Ok(field_id);
        }

        let field_type = infer_field_type(sample);
        match self.create_field(name, field_type, records) {
            Ok(field_id) => Ok(field_id),
            Err(create_err) => self.recover_existing(name, field_type, records, create_err),
        }
    }

    /// Merge the batch's observed option names into an already-existing
    /// multiselect field, pushing a remote update only when the merge added
    /// something.
    fn ensure_options(&mut self, name: &str, field_id: &str, records: &[AttributeRecord]) {
        let observed = collect_option_names(records, name, &self.config.identity_field);
        if observed.is_empty() {
            return;
        }

        let mut field = match self.remote.get_field(field_id) {
            Ok(field) => field,
            Err(err) => {
                warn!(
                    field = %name,
                    field_id = %field_id,
                    error = %err,
                    "failed to fetch current options, field keeps prior options"
                );
                return;
            }
        };

        let (merged, added) = merge_options(&field.options, &observed);
        if added == 0 {
            debug!(field = %name, "option set already complete");
            return;
        }

        field.options = merged;
        if let Err(err) = self.remote.update_field(&field) {
            let err = SyncError::OptionUpdate {
                field: name.to_string(),
                source: err,
            };
            warn!(
                field_id = %field_id,
                added,
                error = %err,
                "field keeps prior options"
            );
            return;
        }

        info!(field = %name, added, "appended new options");
        self.save_options_through_cache(name, &field.options);
    }

    /// Create a missing field remotely, pre-minting the full option list
    /// for multiselect fields so creation is a single call.
    fn create_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        records: &[AttributeRecord],
    ) -> anyhow::Result<String> {
        let options = if field_type == FieldType::Multiselect {
            let observed = collect_option_names(records, name, &self.config.identity_field);
            let (minted, _) = merge_options(&[], &observed);
            minted
        } else {
            Vec::new()
        };

        let created = self.remote.create_field(NewField {
            name: to_display_name(name),
            field_type,
            options,
            visibility: self.config.remote.field_visibility.clone(),
            managed: self.config.remote.field_managed.clone(),
        })?;

        info!(field = %name, field_id = %created.id, field_type = %field_type, "created field");

        if let Err(err) = self.cache.save_field_mapping(name, &created.id) {
            warn!(field = %name, error = %err, "failed to persist field mapping");
        }
        if field_type == FieldType::Multiselect {
            self.save_options_through_cache(name, &created.options);
        }

        Ok(created.id)
    }

    /// Creation failed — commonly because the field already exists remotely
    /// but was missing from the persistent mapping after an earlier partial
    /// failure. Query by derived display name and inferred type; if found,
    /// adopt its id and continue on the existing-field path.
    fn recover_existing(
        &mut self,
        name: &str,
        field_type: FieldType,
        records: &[AttributeRecord],
        create_err: anyhow::Error,
    ) -> Result<String, SyncError> {
        warn!(
            field = %name,
            error = %create_err,
            "field creation failed, searching for existing field"
        );

        let found = match self.remote.search_field(&to_display_name(name), field_type) {
            Ok(found) => found,
            Err(err) => {
                warn!(field = %name, error = %err, "fallback search failed");
                None
            }
        };

        let Some(existing) = found else {
            return Err(SyncError::FieldCreate {
                field: name.to_string(),
                source: create_err,
            });
        };

        info!(field = %name, field_id = %existing.id, "adopted existing remote field");
        if let Err(err) = self.cache.save_field_mapping(name, &existing.id) {
            warn!(field = %name, error = %err, "failed to persist adopted field mapping");
        }

        if field_type == FieldType::Multiselect {
            self.ensure_options(name, &existing.id, records);
        }

        Ok(existing.id)
    }

    /// Write an option list back through the cache as a name → id map.
    fn save_options_through_cache(&mut self, name: &str, options: &[FieldOption]) {
        let map: BTreeMap<String, String> = options
            .iter()
            .filter(|option| !option.name.is_empty() && !option.id.is_empty())
            .map(|option| (option.name.clone(), option.id.clone()))
            .collect();
        if let Err(err) = self.cache.save_field_options(name, &map) {
            warn!(field = %name, error = %err, "failed to persist field options");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreBackedCache;
    use crate::store::MappingStore;
    use crate::test_support::{records_with_tags, MemoryMappingStore, MockRemoteStore};

    fn config() -> SyncConfig {
        SyncConfig::default()
    }

    #[test]
    fn test_creates_text_and_multiselect_fields() {
        let records = records_with_tags();
        let mut remote = MockRemoteStore::default();
        let mut store = MemoryMappingStore::default();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.mapping.len(), 2);
        assert!(outcome.mapping.contains_key("dept"));
        assert!(outcome.mapping.contains_key("tags"));

        let dept = remote.field_by_name("Dept").unwrap();
        assert_eq!(dept.field_type, FieldType::Text);
        assert!(dept.options.is_empty());

        let tags = remote.field_by_name("Tags").unwrap();
        assert_eq!(tags.field_type, FieldType::Multiselect);
        let names: Vec<&str> = tags.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y"]);
    }

    #[test]
    fn test_reuses_mapped_fields_without_remote_calls() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com")
            .with_attribute("dept", Value::Text("Eng".to_string()))];
        let mut remote = MockRemoteStore::default();
        let mut store = MemoryMappingStore::default();
        store.insert_field_mapping("dept", "dept-id");
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert_eq!(outcome.mapping.get("dept"), Some(&"dept-id".to_string()));
        assert_eq!(remote.create_calls(), 0);
        assert_eq!(remote.update_calls(), 0);
    }

    #[test]
    fn test_merges_new_options_into_existing_field() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com").with_attribute(
            "tags",
            Value::List(vec!["Y".to_string(), "Z".to_string()]),
        )];
        let mut remote = MockRemoteStore::default();
        let field_id = remote.seed_multiselect("Tags", &[("id-x", "X"), ("id-y", "Y")]);
        let mut store = MemoryMappingStore::default();
        store.insert_field_mapping("tags", &field_id);
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert_eq!(outcome.mapping.get("tags"), Some(&field_id));
        assert_eq!(remote.update_calls(), 1);

        let tags = remote.field_by_name("Tags").unwrap();
        assert_eq!(tags.options.len(), 3);
        assert_eq!(tags.options[0], FieldOption::new("id-x", "X"));
        assert_eq!(tags.options[1], FieldOption::new("id-y", "Y"));
        assert_eq!(tags.options[2].name, "Z");
    }

    #[test]
    fn test_skips_remote_update_when_no_options_added() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com")
            .with_attribute("tags", Value::List(vec!["X".to_string()]))];
        let mut remote = MockRemoteStore::default();
        let field_id = remote.seed_multiselect("Tags", &[("id-x", "X")]);
        let mut store = MemoryMappingStore::default();
        store.insert_field_mapping("tags", &field_id);
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        synchronizer.sync_fields(&records);

        assert_eq!(remote.update_calls(), 0);
    }

    #[test]
    fn test_creation_failure_falls_back_to_search() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com")
            .with_attribute("dept", Value::Text("Eng".to_string()))];
        let mut remote = MockRemoteStore::default();
        // Field exists remotely but the mapping store lost track of it.
        let existing_id = remote.seed_field("Dept", FieldType::Text);
        remote.fail_create_with_conflict();
        let mut store = MemoryMappingStore::default();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert_eq!(outcome.mapping.get("dept"), Some(&existing_id));
        assert!(outcome.failed.is_empty());
        drop(cache);
        // The adopted id was persisted for the next pass.
        assert_eq!(
            store.get_field_mapping("dept").unwrap(),
            Some(existing_id)
        );
    }

    #[test]
    fn test_unrecoverable_field_is_skipped_not_fatal() {
        let records = vec![
            crate::model::AttributeRecord::new("a@x.com")
                .with_attribute("dept", Value::Text("Eng".to_string()))
                .with_attribute("broken", Value::Text("x".to_string())),
        ];
        let mut remote = MockRemoteStore::default();
        remote.fail_create_for("Broken");
        let mut store = MemoryMappingStore::default();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert_eq!(outcome.failed, vec!["broken".to_string()]);
        assert!(outcome.mapping.contains_key("dept"));
        assert!(!outcome.is_total_failure());
    }

    #[test]
    fn test_unrecoverable_field_reports_create_error() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com")
            .with_attribute("broken", Value::Text("x".to_string()))];
        let mut remote = MockRemoteStore::default();
        remote.fail_create_for("Broken");
        let mut store = MemoryMappingStore::default();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let err = synchronizer
            .sync_one_field("broken", &Value::Text("x".to_string()), &records)
            .unwrap_err();

        assert!(matches!(err, SyncError::FieldCreate { .. }));
        assert!(!err.is_pass_fatal());
    }

    #[test]
    fn test_option_update_failure_keeps_prior_options() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com").with_attribute(
            "tags",
            Value::List(vec!["X".to_string(), "Z".to_string()]),
        )];
        let mut remote = MockRemoteStore::default();
        let field_id = remote.seed_multiselect("Tags", &[("id-x", "X")]);
        remote.fail_updates();
        let mut store = MemoryMappingStore::default();
        store.insert_field_mapping("tags", &field_id);
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        // The field stays mapped; only this pass's option append was lost.
        assert_eq!(outcome.mapping.get("tags"), Some(&field_id));
        assert!(outcome.failed.is_empty());
        assert_eq!(remote.update_calls(), 1);
        let tags = remote.field_by_id(&field_id).unwrap();
        assert_eq!(tags.options.len(), 1);
        drop(cache);
        // The failed merge was not persisted either.
        assert!(store.get_field_options("tags").unwrap().is_empty());
    }

    #[test]
    fn test_cache_read_failure_falls_back_to_creation() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com")
            .with_attribute("dept", Value::Text("Eng".to_string()))];
        let mut remote = MockRemoteStore::default();
        let mut store = MemoryMappingStore::default();
        store.fail_reads();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert!(outcome.failed.is_empty());
        assert!(outcome.mapping.contains_key("dept"));
        assert_eq!(remote.create_calls(), 1);
    }

    #[test]
    fn test_total_failure_detection() {
        let records = vec![crate::model::AttributeRecord::new("a@x.com")
            .with_attribute("dept", Value::Text("Eng".to_string()))];
        let mut remote = MockRemoteStore::default();
        remote.fail_all_calls();
        let mut store = MemoryMappingStore::default();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&records);

        assert!(outcome.is_total_failure());
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let mut remote = MockRemoteStore::default();
        let mut store = MemoryMappingStore::default();
        let config = config();

        let mut cache = StoreBackedCache::new(&mut store);
        let mut synchronizer = FieldSynchronizer::new(&mut remote, &mut cache, &config);
        let outcome = synchronizer.sync_fields(&[]);

        assert!(outcome.mapping.is_empty());
        assert!(outcome.failed.is_empty());
        assert!(!outcome.is_total_failure());
        assert_eq!(remote.create_calls(), 0);
    }
}
