//! # Mapping Store
//!
//! Persistent storage for the state that must survive between sync passes:
//! field name → remote field id mappings, accumulated multiselect option
//! sets, and the sync watermark. "Not found" is never an error for reads —
//! an absent mapping simply means the field has not been created yet.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Persistent mapping store consumed by the cache and the orchestrator.
///
/// Implementations back onto whatever durable storage the host provides;
/// [`KvMappingStore`] adapts any key/value store.
pub trait MappingStore {
    /// Persist a field name → remote field id mapping.
    fn save_field_mapping(&mut self, field: &str, field_id: &str) -> Result<()>;

    /// Look up the remote field id for a field name. `None` means the field
    /// has not been mapped yet.
    fn get_field_mapping(&self, field: &str) -> Result<Option<String>>;

    /// Persist the accumulated option set (option name → option id) for a
    /// multiselect field.
    fn save_field_options(&mut self, field: &str, options: &BTreeMap<String, String>)
        -> Result<()>;

    /// Load the accumulated option set for a field. Empty if none stored.
    fn get_field_options(&self, field: &str) -> Result<BTreeMap<String, String>>;

    /// Persist the timestamp of the last successfully completed pass.
    fn save_last_sync_time(&mut self, at: OffsetDateTime) -> Result<()>;

    /// Load the last-pass timestamp. `None` before the first pass.
    fn get_last_sync_time(&self) -> Result<Option<OffsetDateTime>>;
}

/// Minimal byte-oriented key/value store, the narrow seam a host process
/// supplies. `get` returns `None` for absent keys.
pub trait KeyValueStore {
    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

const FIELD_MAPPING_PREFIX: &str = "field_mapping_";
const FIELD_OPTIONS_PREFIX: &str = "field_options_";
const LAST_SYNC_TIMESTAMP_KEY: &str = "last_sync_timestamp";

/// [`MappingStore`] over any [`KeyValueStore`].
///
/// Field ids are stored as raw strings under `field_mapping_{name}`, option
/// sets as JSON objects under `field_options_{name}`, and the watermark as
/// an RFC 3339 string under a fixed key.
pub struct KvMappingStore<S: KeyValueStore> {
    kv: S,
}

impl<S: KeyValueStore> KvMappingStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn into_inner(self) -> S {
        self.kv
    }
}

impl<S: KeyValueStore> MappingStore for KvMappingStore<S> {
    fn save_field_mapping(&mut self, field: &str, field_id: &str) -> Result<()> {
        let key = format!("{FIELD_MAPPING_PREFIX}{field}");
        self.kv
            .set(&key, field_id.as_bytes().to_vec())
            .with_context(|| format!("failed to save field mapping for {field}"))
    }

    fn get_field_mapping(&self, field: &str) -> Result<Option<String>> {
        let key = format!("{FIELD_MAPPING_PREFIX}{field}");
        let Some(bytes) = self
            .kv
            .get(&key)
            .with_context(|| format!("failed to read field mapping for {field}"))?
        else {
            return Ok(None);
        };
        let id = String::from_utf8(bytes)
            .with_context(|| format!("corrupt field mapping for {field}"))?;
        if id.is_empty() {
            return Ok(None);
        }
        Ok(Some(id))
    }

    fn save_field_options(
        &mut self,
        field: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<()> {
        let key = format!("{FIELD_OPTIONS_PREFIX}{field}");
        let data = serde_json::to_vec(options)
            .with_context(|| format!("failed to encode options for {field}"))?;
        self.kv
            .set(&key, data)
            .with_context(|| format!("failed to save field options for {field}"))
    }

    fn get_field_options(&self, field: &str) -> Result<BTreeMap<String, String>> {
        let key = format!("{FIELD_OPTIONS_PREFIX}{field}");
        let Some(bytes) = self
            .kv
            .get(&key)
            .with_context(|| format!("failed to read field options for {field}"))?
        else {
            return Ok(BTreeMap::new());
        };
        if bytes.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt field options for {field}"))
    }

    fn save_last_sync_time(&mut self, at: OffsetDateTime) -> Result<()> {
        let stamp = at
            .format(&Rfc3339)
            .context("failed to format sync watermark")?;
        self.kv
            .set(LAST_SYNC_TIMESTAMP_KEY, stamp.into_bytes())
            .context("failed to save sync watermark")
    }

    fn get_last_sync_time(&self) -> Result<Option<OffsetDateTime>> {
        let Some(bytes) = self
            .kv
            .get(LAST_SYNC_TIMESTAMP_KEY)
            .context("failed to read sync watermark")?
        else {
            return Ok(None);
        };
        let stamp = String::from_utf8(bytes).context("corrupt sync watermark")?;
        let at = OffsetDateTime::parse(&stamp, &Rfc3339)
            .with_context(|| format!("failed to parse sync watermark: {stamp}"))?;
        Ok(Some(at))
    }
}
