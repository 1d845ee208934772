//! Storage layer for the `TenantScope` server.
//!
//! - [`StorageEngine`]: keyed in-memory record storage for one table
//! - [`MemorySession`]: the row [`Session`](tenantscope_core::Session) the
//!   isolation layer wraps, built from one engine per table

pub mod engine;
pub mod engines;
pub mod record;
pub mod session;

pub use engine::StorageEngine;
pub use engines::HashMapStorage;
pub use record::{Record, RecordMetadata};
pub use session::{EngineFactory, MemorySession};
