//! Low-level storage engine trait.
//!
//! [`StorageEngine`] is the innermost storage layer: one keyed map of
//! [`Record`]s per table, with no knowledge of tenants or predicates.

use tenantscope_core::EntityKey;

use super::record::Record;

/// Keyed record storage for a single table.
///
/// All operations are synchronous. Wrapped in `Arc<dyn StorageEngine>` for
/// sharing across request tasks.
pub trait StorageEngine: Send + Sync + 'static {
    /// Insert or replace a record. Returns the previous record if any.
    fn put(&self, key: EntityKey, record: Record) -> Option<Record>;

    fn get(&self, key: EntityKey) -> Option<Record>;

    fn remove(&self, key: EntityKey) -> Option<Record>;

    /// Point-in-time copy of every entry, ordered by key.
    fn snapshot(&self) -> Vec<(EntityKey, Record)>;
}
