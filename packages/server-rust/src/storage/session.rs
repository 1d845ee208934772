//! In-memory [`Session`] over per-table storage engines.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::RwLock;
use tenantscope_core::{EntityKey, QuerySpec, Row, Session};
use tracing::trace;

use super::engine::StorageEngine;
use super::engines::HashMapStorage;
use super::record::Record;

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
#[allow(clippy::cast_possible_truncation)]
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Builds the engine backing a newly seen table.
pub type EngineFactory = Arc<dyn Fn() -> Arc<dyn StorageEngine> + Send + Sync>;

/// Row session backed by one [`StorageEngine`] per table.
///
/// Keys are allocated from a single counter, so they are unique across
/// tables and increase in insertion order. Batch inserts hold the commit
/// lock exclusively, so readers see either none or all of a batch.
pub struct MemorySession {
    tables: DashMap<&'static str, Arc<dyn StorageEngine>>,
    factory: EngineFactory,
    next_key: AtomicU64,
    commit: RwLock<()>,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    /// Session whose tables are [`HashMapStorage`] engines.
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(Arc::new(|| Arc::new(HashMapStorage::new()) as Arc<dyn StorageEngine>))
    }

    #[must_use]
    pub fn with_factory(factory: EngineFactory) -> Self {
        Self {
            tables: DashMap::new(),
            factory,
            next_key: AtomicU64::new(0),
            commit: RwLock::new(()),
        }
    }

    /// Engine for `table`, created on first use.
    pub fn table(&self, table: &'static str) -> Arc<dyn StorageEngine> {
        Arc::clone(
            self.tables
                .entry(table)
                .or_insert_with(|| (self.factory)())
                .value(),
        )
    }

    /// Stored record including metadata, bypassing every scope.
    #[must_use]
    pub fn record(&self, table: &'static str, key: EntityKey) -> Option<Record> {
        self.existing(table)?.get(key)
    }

    fn existing(&self, table: &'static str) -> Option<Arc<dyn StorageEngine>> {
        self.tables.get(table).map(|engine| Arc::clone(engine.value()))
    }

    fn allocate(&self) -> EntityKey {
        self.next_key.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Session for MemorySession {
    fn select(&self, spec: &QuerySpec) -> anyhow::Result<Vec<(EntityKey, Row)>> {
        let _read = self.commit.read();
        let Some(engine) = self.existing(spec.table) else {
            return Ok(Vec::new());
        };
        let rows: Vec<(EntityKey, Row)> = engine
            .snapshot()
            .into_iter()
            .filter(|(key, record)| spec.matches(*key, &record.row))
            .skip(spec.offset)
            .take(spec.limit.unwrap_or(usize::MAX))
            .map(|(key, record)| (key, record.row))
            .collect();
        trace!(table = spec.table, rows = rows.len(), "select");
        Ok(rows)
    }

    fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize> {
        let _read = self.commit.read();
        Ok(self.existing(spec.table).map_or(0, |engine| {
            engine
                .snapshot()
                .iter()
                .filter(|(key, record)| spec.matches(*key, &record.row))
                .count()
        }))
    }

    fn get(&self, table: &'static str, key: EntityKey) -> anyhow::Result<Option<Row>> {
        let _read = self.commit.read();
        Ok(self.record(table, key).map(|record| record.row))
    }

    fn insert(&self, table: &'static str, row: Row) -> anyhow::Result<EntityKey> {
        let _read = self.commit.read();
        let key = self.allocate();
        self.table(table).put(key, Record::new(row, now_millis()));
        Ok(key)
    }

    fn insert_batch(&self, table: &'static str, rows: Vec<Row>) -> anyhow::Result<Vec<EntityKey>> {
        let now = now_millis();
        let records: Vec<(EntityKey, Record)> = rows
            .into_iter()
            .map(|row| (self.allocate(), Record::new(row, now)))
            .collect();

        let engine = self.table(table);
        let _write = self.commit.write();
        let keys = records
            .into_iter()
            .map(|(key, record)| {
                engine.put(key, record);
                key
            })
            .collect();
        Ok(keys)
    }

    fn update(&self, table: &'static str, key: EntityKey, row: Row) -> anyhow::Result<bool> {
        let _read = self.commit.read();
        let Some(engine) = self.existing(table) else {
            return Ok(false);
        };
        let Some(mut record) = engine.get(key) else {
            return Ok(false);
        };
        record.row = row;
        record.metadata.on_update(now_millis());
        engine.put(key, record);
        Ok(true)
    }

    fn delete(&self, table: &'static str, key: EntityKey) -> anyhow::Result<bool> {
        let _read = self.commit.read();
        Ok(self
            .existing(table)
            .is_some_and(|engine| engine.remove(key).is_some()))
    }
}
