//! Shared test fixtures: in-memory stores, a scriptable remote store, and
//! canned providers/resolvers. Used by in-module unit tests and imported
//! by the integration tests.

#![allow(dead_code)]

use crate::model::{AttributeRecord, FieldOption, FieldType, NewField, RemoteField, Value, ValueRecord};
use crate::provider::AttributeProvider;
use crate::remote::{IdentityResolver, RemoteStore};
use crate::store::{KeyValueStore, MappingStore};
use anyhow::{anyhow, bail, Result};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;
use time::OffsetDateTime;

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }
}

#[derive(Debug, Default)]
struct MappingInner {
    mappings: BTreeMap<String, String>,
    options: BTreeMap<String, BTreeMap<String, String>>,
    last_sync: Option<OffsetDateTime>,
    mapping_reads: usize,
    options_reads: usize,
    fail_next_write: bool,
    fail_reads: bool,
}

/// In-memory [`MappingStore`] with read counters and scriptable failures.
/// Clones share state, so a test can keep a handle after handing the store
/// to the engine.
#[derive(Debug, Default, Clone)]
pub struct MemoryMappingStore {
    inner: Rc<RefCell<MappingInner>>,
}

impl MemoryMappingStore {
    pub fn insert_field_mapping(&mut self, field: &str, field_id: &str) {
        self.inner
            .borrow_mut()
            .mappings
            .insert(field.to_string(), field_id.to_string());
    }

    pub fn insert_field_option(&mut self, field: &str, option: &str, option_id: &str) {
        self.inner
            .borrow_mut()
            .options
            .entry(field.to_string())
            .or_default()
            .insert(option.to_string(), option_id.to_string());
    }

    pub fn field_mapping_reads(&self) -> usize {
        self.inner.borrow().mapping_reads
    }

    pub fn field_options_reads(&self) -> usize {
        self.inner.borrow().options_reads
    }

    pub fn last_sync(&self) -> Option<OffsetDateTime> {
        self.inner.borrow().last_sync
    }

    /// Make the next write fail once.
    pub fn fail_next_write(&mut self) {
        self.inner.borrow_mut().fail_next_write = true;
    }

    /// Make every read fail.
    pub fn fail_reads(&mut self) {
        self.inner.borrow_mut().fail_reads = true;
    }

    fn take_write_failure(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        std::mem::take(&mut inner.fail_next_write)
    }
}

impl MappingStore for MemoryMappingStore {
    fn save_field_mapping(&mut self, field: &str, field_id: &str) -> Result<()> {
        if self.take_write_failure() {
            bail!("injected write failure");
        }
        self.inner
            .borrow_mut()
            .mappings
            .insert(field.to_string(), field_id.to_string());
        Ok(())
    }

    fn get_field_mapping(&self, field: &str) -> Result<Option<String>> {
        let mut inner = self.inner.borrow_mut();
        inner.mapping_reads += 1;
        if inner.fail_reads {
            bail!("injected read failure");
        }
        Ok(inner.mappings.get(field).cloned())
    }

    fn save_field_options(
        &mut self,
        field: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<()> {
        if self.take_write_failure() {
            bail!("injected write failure");
        }
        self.inner
            .borrow_mut()
            .options
            .insert(field.to_string(), options.clone());
        Ok(())
    }

    fn get_field_options(&self, field: &str) -> Result<BTreeMap<String, String>> {
        let mut inner = self.inner.borrow_mut();
        inner.options_reads += 1;
        if inner.fail_reads {
            bail!("injected read failure");
        }
        Ok(inner.options.get(field).cloned().unwrap_or_default())
    }

    fn save_last_sync_time(&mut self, at: OffsetDateTime) -> Result<()> {
        if self.take_write_failure() {
            bail!("injected write failure");
        }
        self.inner.borrow_mut().last_sync = Some(at);
        Ok(())
    }

    fn get_last_sync_time(&self) -> Result<Option<OffsetDateTime>> {
        Ok(self.inner.borrow().last_sync)
    }
}

#[derive(Debug, Default)]
struct RemoteInner {
    fields: Vec<RemoteField>,
    upserts: Vec<(String, Vec<ValueRecord>)>,
    next_field_id: usize,
    create_calls: usize,
    update_calls: usize,
    fail_create_all: bool,
    fail_create_names: BTreeSet<String>,
    fail_update_calls: bool,
    fail_everything: bool,
    fail_upsert_users: BTreeSet<String>,
}

/// Scriptable [`RemoteStore`]: deterministic ids, call counters, injectable
/// failures. Clones share state.
#[derive(Debug, Default, Clone)]
pub struct MockRemoteStore {
    inner: Rc<RefCell<RemoteInner>>,
}

impl MockRemoteStore {
    /// Seed an existing plain field, returning its id.
    pub fn seed_field(&mut self, name: &str, field_type: FieldType) -> String {
        let id = self.mint_id();
        self.inner.borrow_mut().fields.push(RemoteField {
            id: id.clone(),
            name: name.to_string(),
            field_type,
            options: Vec::new(),
        });
        id
    }

    /// Seed an existing multiselect field with `(id, name)` options.
    pub fn seed_multiselect(&mut self, name: &str, options: &[(&str, &str)]) -> String {
        let id = self.mint_id();
        self.inner.borrow_mut().fields.push(RemoteField {
            id: id.clone(),
            name: name.to_string(),
            field_type: FieldType::Multiselect,
            options: options
                .iter()
                .map(|(id, name)| FieldOption::new(*id, *name))
                .collect(),
        });
        id
    }

    pub fn field_by_name(&self, name: &str) -> Option<RemoteField> {
        self.inner
            .borrow()
            .fields
            .iter()
            .find(|field| field.name == name)
            .cloned()
    }

    pub fn field_by_id(&self, id: &str) -> Option<RemoteField> {
        self.inner
            .borrow()
            .fields
            .iter()
            .find(|field| field.id == id)
            .cloned()
    }

    pub fn create_calls(&self) -> usize {
        self.inner.borrow().create_calls
    }

    pub fn update_calls(&self) -> usize {
        self.inner.borrow().update_calls
    }

    /// All `(user_id, values)` upserts in call order.
    pub fn upserts(&self) -> Vec<(String, Vec<ValueRecord>)> {
        self.inner.borrow().upserts.clone()
    }

    /// Every create fails as if the field already existed.
    pub fn fail_create_with_conflict(&mut self) {
        self.inner.borrow_mut().fail_create_all = true;
    }

    /// Creates for one display name fail.
    pub fn fail_create_for(&mut self, display_name: &str) {
        self.inner
            .borrow_mut()
            .fail_create_names
            .insert(display_name.to_string());
    }

    /// Every field update fails.
    pub fn fail_updates(&mut self) {
        self.inner.borrow_mut().fail_update_calls = true;
    }

    /// Every remote call fails, as if the schema API were unreachable.
    pub fn fail_all_calls(&mut self) {
        self.inner.borrow_mut().fail_everything = true;
    }

    /// Upserts for one user id fail.
    pub fn fail_upsert_for(&mut self, user_id: &str) {
        self.inner
            .borrow_mut()
            .fail_upsert_users
            .insert(user_id.to_string());
    }

    fn mint_id(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        inner.next_field_id += 1;
        format!("field-{}", inner.next_field_id)
    }
}

impl RemoteStore for MockRemoteStore {
    fn create_field(&mut self, field: NewField) -> Result<RemoteField> {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.create_calls += 1;
            if inner.fail_everything {
                bail!("remote store unreachable");
            }
            if inner.fail_create_all || inner.fail_create_names.contains(&field.name) {
                bail!("a field named {:?} already exists", field.name);
            }
            inner.next_field_id += 1;
            format!("field-{}", inner.next_field_id)
        };

        let created = RemoteField {
            id,
            name: field.name,
            field_type: field.field_type,
            options: field.options,
        };
        self.inner.borrow_mut().fields.push(created.clone());
        Ok(created)
    }

    fn update_field(&mut self, field: &RemoteField) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.update_calls += 1;
        if inner.fail_everything {
            bail!("remote store unreachable");
        }
        if inner.fail_update_calls {
            bail!("update rejected for field {}", field.id);
        }
        let existing = inner
            .fields
            .iter_mut()
            .find(|candidate| candidate.id == field.id)
            .ok_or_else(|| anyhow!("no field with id {}", field.id))?;
        *existing = field.clone();
        Ok(())
    }

    fn get_field(&self, field_id: &str) -> Result<RemoteField> {
        let inner = self.inner.borrow();
        if inner.fail_everything {
            bail!("remote store unreachable");
        }
        inner
            .fields
            .iter()
            .find(|field| field.id == field_id)
            .cloned()
            .ok_or_else(|| anyhow!("no field with id {field_id}"))
    }

    fn search_field(&self, name: &str, field_type: FieldType) -> Result<Option<RemoteField>> {
        let inner = self.inner.borrow();
        if inner.fail_everything {
            bail!("remote store unreachable");
        }
        Ok(inner
            .fields
            .iter()
            .find(|field| field.name == name && field.field_type == field_type)
            .cloned())
    }

    fn upsert_values(&mut self, user_id: &str, values: &[ValueRecord]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_everything {
            bail!("remote store unreachable");
        }
        if inner.fail_upsert_users.contains(user_id) {
            bail!("upsert rejected for user {user_id}");
        }
        inner
            .upserts
            .push((user_id.to_string(), values.to_vec()));
        Ok(())
    }
}

/// Provider that hands out pre-canned batches in order, then empty batches.
pub struct StaticProvider {
    batches: VecDeque<Vec<AttributeRecord>>,
    pub closed: bool,
}

impl StaticProvider {
    pub fn new(batches: Vec<Vec<AttributeRecord>>) -> Self {
        Self {
            batches: batches.into(),
            closed: false,
        }
    }

    pub fn single(batch: Vec<AttributeRecord>) -> Self {
        Self::new(vec![batch])
    }
}

impl AttributeProvider for StaticProvider {
    fn fetch_changed_records(&mut self) -> Result<Vec<AttributeRecord>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Provider whose fetch always fails.
#[derive(Debug, Default)]
pub struct FailingProvider;

impl AttributeProvider for FailingProvider {
    fn fetch_changed_records(&mut self) -> Result<Vec<AttributeRecord>> {
        bail!("source offline")
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Resolver over a fixed identity → user id map. Unlisted identities
/// resolve to `None`; identities in the failure set error.
#[derive(Debug, Default)]
pub struct MapResolver {
    users: BTreeMap<String, String>,
    failing: BTreeSet<String>,
}

impl MapResolver {
    pub fn with_users(pairs: &[(&str, &str)]) -> Self {
        Self {
            users: pairs
                .iter()
                .map(|(identity, id)| (identity.to_string(), id.to_string()))
                .collect(),
            failing: BTreeSet::new(),
        }
    }

    pub fn fail_for(&mut self, identity: &str) {
        self.failing.insert(identity.to_string());
    }
}

impl IdentityResolver for MapResolver {
    fn resolve(&self, identity: &str) -> Result<Option<String>> {
        if self.failing.contains(identity) {
            bail!("identity service unavailable");
        }
        Ok(self.users.get(identity).cloned())
    }
}

/// The canonical two-user batch: one text field everywhere, one multiselect
/// field on the second user only.
pub fn records_with_tags() -> Vec<AttributeRecord> {
    vec![
        AttributeRecord::new("a@x.com").with_attribute("dept", Value::Text("Eng".to_string())),
        AttributeRecord::new("b@x.com")
            .with_attribute("dept", Value::Text("Sales".to_string()))
            .with_attribute(
                "tags",
                Value::List(vec!["X".to_string(), "Y".to_string()]),
            ),
    ]
}
