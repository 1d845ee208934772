//! Concrete [`StorageEngine`](super::StorageEngine) implementations.

pub mod hashmap;

pub use hashmap::HashMapStorage;
