//! # Attrsync
//!
//! Synchronizes structured user-attribute records from an external data
//! source into a remote typed property store, creating schema ("fields")
//! on demand and keeping per-user values current.
//!
//! The engine infers field types from semi-structured data, maintains a
//! stable mapping between external field/option names and remote-assigned
//! identifiers, merges multiselect option sets append-only so that issued
//! identifiers are never invalidated, and runs incrementally and
//! fault-tolerantly across repeated passes. I/O collaborators — the
//! attribute source, the remote store, the persistent mapping store, and
//! the identity lookup — are narrow trait seams supplied by the host.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod field_sync;
pub mod infer;
pub mod merge;
pub mod model;
pub mod provider;
pub mod remote;
pub mod store;
pub mod value_sync;

#[doc(hidden)]
pub mod test_support;

// Re-export main types for convenience
pub use cache::{FieldCache, StoreBackedCache};
pub use config::{ConfigError, ConfigOverrides, SyncConfig};
pub use error::SyncError;
pub use field_sync::{FieldSynchronizer, SchemaOutcome};
pub use infer::{infer_field_type, to_display_name};
pub use model::{
    AttributeRecord, FieldOption, FieldType, NewField, RemoteField, Value, ValueRecord,
};
pub use provider::{AttributeProvider, FileProvider};
pub use remote::{IdentityResolver, RemoteStore};
pub use store::{KeyValueStore, KvMappingStore, MappingStore};

use crate::value_sync::build_values;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

/// Counts for one completed sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records fetched from the source.
    pub fetched: usize,
    /// Users whose values were upserted.
    pub users_synced: usize,
    /// Users skipped: missing or unresolved identity, or a failed upsert.
    pub users_skipped: usize,
    /// Users that produced no value records (nothing to write).
    pub users_empty: usize,
    /// Fields mapped this pass (created, reused, or recovered).
    pub fields_mapped: usize,
    /// Fields that failed entirely and were left out of the mapping.
    pub fields_failed: usize,
}

/// Main API: the sync orchestrator.
///
/// One engine runs one pass at a time (`run_pass` takes `&mut self`);
/// cluster-wide exclusivity across hosts is the scheduler's job. A pass
/// walks Fetching → SynchronizingSchema → SynchronizingValues, persisting
/// the watermark only when fetch and schema both succeeded — user-level
/// failures never block it.
pub struct SyncEngine {
    provider: Box<dyn AttributeProvider>,
    remote: Box<dyn RemoteStore>,
    store: Box<dyn MappingStore>,
    resolver: Box<dyn IdentityResolver>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new<P, R, S, I>(
        provider: P,
        remote: R,
        store: S,
        resolver: I,
        config: SyncConfig,
    ) -> Self
    where
        P: AttributeProvider + 'static,
        R: RemoteStore + 'static,
        S: MappingStore + 'static,
        I: IdentityResolver + 'static,
    {
        Self {
            provider: Box::new(provider),
            remote: Box::new(remote),
            store: Box::new(store),
            resolver: Box::new(resolver),
            config,
        }
    }

    /// Run one complete sync pass.
    pub fn run_pass(&mut self) -> Result<SyncReport, SyncError> {
        info!("sync pass starting");

        let records = self
            .provider
            .fetch_changed_records()
            .map_err(SyncError::SourceUnavailable)?;

        if records.is_empty() {
            info!("no changed records to sync");
            self.advance_watermark();
            return Ok(SyncReport::default());
        }
        info!(count = records.len(), "fetched records for sync");

        let mut report = SyncReport {
            fetched: records.len(),
            ..SyncReport::default()
        };

        // The cache lives for exactly this pass: built empty here,
        // discarded before the watermark is advanced.
        let remote = self.remote.as_mut();
        let mut cache = StoreBackedCache::new(self.store.as_mut());

        let outcome =
            FieldSynchronizer::new(&mut *remote, &mut cache, &self.config).sync_fields(&records);
        report.fields_mapped = outcome.mapping.len();
        report.fields_failed = outcome.failed.len();
        if outcome.is_total_failure() {
            return Err(SyncError::SchemaUnavailable {
                failed_count: outcome.failed.len(),
            });
        }

        for record in &records {
            if record.identity.is_empty() {
                warn!("record missing identity, skipping user");
                report.users_skipped += 1;
                continue;
            }

            let user_id = match self.resolver.resolve(&record.identity) {
                Ok(Some(id)) => id,
                Ok(None) => {
                    let err = SyncError::IdentityNotFound {
                        identity: record.identity.clone(),
                    };
                    warn!(error = %err, "skipping user");
                    report.users_skipped += 1;
                    continue;
                }
                Err(err) => {
                    warn!(
                        identity = %record.identity,
                        error = %err,
                        "identity lookup failed, skipping user"
                    );
                    report.users_skipped += 1;
                    continue;
                }
            };

            let values = build_values(record, &mut cache, &self.config.identity_field);
            if values.is_empty() {
                debug!(identity = %record.identity, "no values to sync for user");
                report.users_empty += 1;
                continue;
            }

            if let Err(err) = remote.upsert_values(&user_id, &values) {
                let err = SyncError::ValueUpsert {
                    identity: record.identity.clone(),
                    source: err,
                };
                error!(
                    value_count = values.len(),
                    error = %err,
                    "value upsert failed, skipping user"
                );
                report.users_skipped += 1;
                continue;
            }

            debug!(
                identity = %record.identity,
                value_count = values.len(),
                "synced user values"
            );
            report.users_synced += 1;
        }

        drop(cache);
        self.advance_watermark();

        info!(
            users_synced = report.users_synced,
            users_skipped = report.users_skipped,
            fields_mapped = report.fields_mapped,
            fields_failed = report.fields_failed,
            "sync pass completed"
        );
        Ok(report)
    }

    /// Timestamp of the last successfully completed pass, if any.
    pub fn last_sync_time(&self) -> Option<OffsetDateTime> {
        self.store.get_last_sync_time().ok().flatten()
    }

    /// Release provider resources. Call when the engine is retired.
    pub fn close(&mut self) -> anyhow::Result<()> {
        self.provider.close()
    }

    /// Persist the watermark. Failure is logged but not fatal: the next
    /// pass re-fetches a superset and every operation is idempotent.
    fn advance_watermark(&mut self) {
        if let Err(err) = self.store.save_last_sync_time(OffsetDateTime::now_utc()) {
            error!(error = %err, "failed to persist sync watermark");
        }
    }
}
