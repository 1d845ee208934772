//! HTTP handler definitions for the tenantscope server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors), the [`CurrentTenant`] extractor, and re-exports all handler
//! functions for convenient access when building the router.

pub mod documents;
pub mod error;
pub mod health;
pub mod tenant;

pub use documents::{create_document, delete_document, get_document, list_documents};
pub use error::ApiError;
pub use health::{health_handler, liveness_handler};
pub use tenant::{current_tenant_handler, switch_tenant_handler};

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tenantscope_core::{Database, TenantId};

use super::NetworkConfig;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Cloning is cheap; the database shares its session and context manager.
#[derive(Clone)]
pub struct AppState {
    /// Tenant-aware database facade.
    pub db: Database,
    /// Network configuration (bind address, timeouts, token secret).
    pub config: Arc<NetworkConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

/// The tenant the current request acts in.
///
/// Rejects with 400 when no tenant resolves, so handlers taking it never run
/// without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentTenant(pub TenantId);

impl FromRequestParts<AppState> for CurrentTenant {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant_id = state.db.manager().require_tenant_id("request")?;
        Ok(Self(tenant_id))
    }
}
