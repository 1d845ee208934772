//! tenantscope server: in-memory storage behind the isolation layer and the
//! axum integration that gives every request its own tenant context.

pub mod demo;
pub mod domain;
pub mod network;
pub mod storage;

pub use domain::{Document, DocumentView};
pub use network::{NetworkConfig, NetworkModule};
pub use storage::MemorySession;

#[cfg(test)]
pub(crate) mod test_support;
