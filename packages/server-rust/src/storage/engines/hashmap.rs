//! In-memory [`StorageEngine`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking.

use dashmap::DashMap;
use tenantscope_core::EntityKey;

use crate::storage::engine::StorageEngine;
use crate::storage::record::Record;

/// In-memory storage backed by [`DashMap`].
#[derive(Default)]
pub struct HashMapStorage {
    entries: DashMap<EntityKey, Record>,
}

impl HashMapStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageEngine for HashMapStorage {
    fn put(&self, key: EntityKey, record: Record) -> Option<Record> {
        self.entries.insert(key, record)
    }

    fn get(&self, key: EntityKey) -> Option<Record> {
        self.entries.get(&key).map(|r| r.clone())
    }

    fn remove(&self, key: EntityKey) -> Option<Record> {
        self.entries.remove(&key).map(|(_, r)| r)
    }

    fn snapshot(&self) -> Vec<(EntityKey, Record)> {
        let mut entries: Vec<(EntityKey, Record)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_unstable_by_key(|(key, _)| *key);
        entries
    }
}
