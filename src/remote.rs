//! # Remote Interfaces
//!
//! Narrow interfaces over the remote attribute store and the identity
//! lookup. The engine never talks to a concrete API; hosts supply
//! implementations with whatever transport and timeouts they need. All
//! calls are synchronous request/response — retries and backoff, if any,
//! belong to the implementation.

use crate::model::{FieldType, NewField, RemoteField, ValueRecord};
use anyhow::Result;

/// Remote attribute store: typed schema slots ("fields") plus per-user
/// typed values.
pub trait RemoteStore {
    /// Create a field. The store assigns and returns the field id, and for
    /// multiselect fields persists the caller-supplied option ids.
    fn create_field(&mut self, field: NewField) -> Result<RemoteField>;

    /// Replace a field's definition, including its option list.
    fn update_field(&mut self, field: &RemoteField) -> Result<()>;

    /// Fetch a field by id.
    fn get_field(&self, field_id: &str) -> Result<RemoteField>;

    /// Find a field by display name and type. `None` if absent.
    fn search_field(&self, name: &str, field_type: FieldType) -> Result<Option<RemoteField>>;

    /// Upsert all of one user's values in a single batched call.
    fn upsert_values(&mut self, user_id: &str, values: &[ValueRecord]) -> Result<()>;
}

/// Resolves an external identity (e.g. an email) to a remote user id.
pub trait IdentityResolver {
    /// `None` means the identity is unknown remotely; errors are transport
    /// failures.
    fn resolve(&self, identity: &str) -> Result<Option<String>>;
}
