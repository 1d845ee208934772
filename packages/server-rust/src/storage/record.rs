//! Record types for the storage layer.
//!
//! A [`Record`] pairs a stored row with server-internal metadata that never
//! leaves the storage layer.

use tenantscope_core::Row;

/// Metadata tracked for every stored row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Incremented on every update, starting at 1.
    pub version: u32,
    /// Wall-clock millis since epoch when the row was inserted.
    pub creation_time: i64,
    /// Wall-clock millis since epoch of the last write.
    pub last_update_time: i64,
}

impl RecordMetadata {
    #[must_use]
    pub fn new(now: i64) -> Self {
        Self {
            version: 1,
            creation_time: now,
            last_update_time: now,
        }
    }

    /// Records a write: increments `version` and updates `last_update_time`.
    pub fn on_update(&mut self, now: i64) {
        self.version = self.version.saturating_add(1);
        self.last_update_time = now;
    }
}

/// A stored row plus its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub row: Row,
    pub metadata: RecordMetadata,
}

impl Record {
    #[must_use]
    pub fn new(row: Row, now: i64) -> Self {
        Self {
            row,
            metadata: RecordMetadata::new(now),
        }
    }
}
