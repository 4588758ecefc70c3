//! # Field/Option Cache
//!
//! Read-through, write-through cache over the persistent mapping store.
//! Built fresh at the start of each sync pass and discarded at the end, so
//! cross-pass staleness is impossible; the price is one backing-store round
//! trip per field (or option set) the first time it is touched each pass.

use crate::store::MappingStore;
use anyhow::Result;
use std::collections::BTreeMap;

/// Cache over field and option mappings for one sync pass.
///
/// The trait is a deliberate seam: hosts can substitute an alternative
/// caching strategy without touching the synchronizer or value builder.
pub trait FieldCache {
    /// Remote field id for an external field name. `None` means the field
    /// is not mapped; errors are backing-store failures only. The negative
    /// result is cached too, so repeated misses cost one read.
    fn field_id(&mut self, field: &str) -> Result<Option<String>>;

    /// Remote option id for an option name of a multiselect field. The
    /// first access to any option of a field loads and caches that field's
    /// whole option set.
    fn option_id(&mut self, field: &str, option: &str) -> Result<Option<String>>;

    /// Write-through save of a field mapping: in-memory first, then the
    /// backing store. On persistence failure the in-memory entry stays —
    /// it is correct for the remainder of this pass.
    fn save_field_mapping(&mut self, field: &str, field_id: &str) -> Result<()>;

    /// Write-through save of a field's option set. The cache keeps its own
    /// deep copy, so later mutation of the caller's map cannot corrupt
    /// cache state.
    fn save_field_options(
        &mut self,
        field: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Default [`FieldCache`] backed by a [`MappingStore`].
pub struct StoreBackedCache<'a> {
    store: &'a mut dyn MappingStore,
    field_ids: BTreeMap<String, Option<String>>,
    field_options: BTreeMap<String, BTreeMap<String, String>>,
}

impl<'a> StoreBackedCache<'a> {
    pub fn new(store: &'a mut dyn MappingStore) -> Self {
        Self {
            store,
            field_ids: BTreeMap::new(),
            field_options: BTreeMap::new(),
        }
    }
}

impl FieldCache for StoreBackedCache<'_> {
    fn field_id(&mut self, field: &str) -> Result<Option<String>> {
        if let Some(cached) = self.field_ids.get(field) {
            return Ok(cached.clone());
        }

        let id = self.store.get_field_mapping(field)?;
        self.field_ids.insert(field.to_string(), id.clone());
        Ok(id)
    }

    fn option_id(&mut self, field: &str, option: &str) -> Result<Option<String>> {
        if let Some(options) = self.field_options.get(field) {
            return Ok(options.get(option).cloned());
        }

        let options = self.store.get_field_options(field)?;
        let id = options.get(option).cloned();
        self.field_options.insert(field.to_string(), options);
        Ok(id)
    }

    fn save_field_mapping(&mut self, field: &str, field_id: &str) -> Result<()> {
        self.field_ids
            .insert(field.to_string(), Some(field_id.to_string()));
        self.store.save_field_mapping(field, field_id)
    }

    fn save_field_options(
        &mut self,
        field: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.field_options
            .insert(field.to_string(), options.clone());
        self.store.save_field_options(field, options)
    }
}
