//! # Error Taxonomy
//!
//! Failure classes for a sync pass. Only [`SyncError::SourceUnavailable`]
//! and a wholesale schema-subsystem outage abort a pass; every other
//! condition degrades gracefully, discarding the smallest unit of work
//! (one field, one option update, one attribute, or one user) so unrelated
//! data still makes progress.

/// A classified sync failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The external source could not deliver the batch. Pass-fatal: no
    /// watermark update, error surfaced to the scheduler for retry.
    #[error("attribute source unavailable")]
    SourceUnavailable(#[source] anyhow::Error),

    /// The remote schema API was effectively unreachable: fields were
    /// discovered but not a single one could be mapped. Pass-fatal.
    #[error("schema synchronization failed for all {failed_count} discovered fields")]
    SchemaUnavailable { failed_count: usize },

    /// The persistent mapping store failed under the cache. Logged and
    /// tolerated; the pass continues best-effort.
    #[error("cache backing store failed for field {field}")]
    CacheBackingStore {
        field: String,
        #[source]
        source: anyhow::Error,
    },

    /// Remote field creation failed and the fallback search found nothing.
    /// The field is skipped for this pass.
    #[error("failed to create remote field {field}")]
    FieldCreate {
        field: String,
        #[source]
        source: anyhow::Error,
    },

    /// Pushing a merged option list failed; the field keeps its prior
    /// options for this pass.
    #[error("failed to update options for field {field}")]
    OptionUpdate {
        field: String,
        #[source]
        source: anyhow::Error,
    },

    /// The identity did not resolve to a remote user. The user is skipped.
    #[error("identity {identity} not found")]
    IdentityNotFound { identity: String },

    /// An attribute value could not be formatted. The attribute is skipped.
    #[error("failed to format value for field {field}: {reason}")]
    ValueFormat { field: String, reason: String },

    /// The batched value upsert for one user failed. The user is skipped.
    #[error("failed to upsert values for {identity}")]
    ValueUpsert {
        identity: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SyncError {
    /// Whether this failure aborts the whole pass (no watermark update).
    pub fn is_pass_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_) | SyncError::SchemaUnavailable { .. }
        )
    }
}
