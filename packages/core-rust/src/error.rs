//! Typed failures surfaced when tenant context is consumed.
//!
//! Resolution never fails (it degrades to `None`); these errors are raised
//! at the point where an operation *requires* a tenant or crosses one.

use crate::types::TenantId;

/// Errors returned by the isolation layer.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// An operation that requires a tenant found none resolvable.
    #[error("no tenant context available for {operation}")]
    NoContext { operation: &'static str },

    /// The acting context may not touch the target tenant.
    #[error("tenant access denied: {reason}")]
    AccessDenied {
        tenant_id: Option<TenantId>,
        reason: &'static str,
    },

    /// The tenant does not exist or is no longer active.
    #[error("tenant {tenant_id} does not exist or is inactive")]
    InvalidTenant { tenant_id: TenantId },

    #[error("no rows found in {table}")]
    NoResult { table: &'static str },

    #[error("expected one row in {table}, found {count}")]
    MultipleResults { table: &'static str, count: usize },

    #[error("malformed record in {table}: {source}")]
    MalformedRecord {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl TenantError {
    pub(crate) fn denied(tenant_id: Option<TenantId>, reason: &'static str) -> Self {
        Self::AccessDenied { tenant_id, reason }
    }

    /// True for failures a boundary should report as an authorization
    /// rejection. Inactive tenants are escalated to the same class.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::InvalidTenant { .. })
    }

    #[must_use]
    pub fn is_no_context(&self) -> bool {
        matches!(self, Self::NoContext { .. })
    }
}

pub type TenantResult<T> = Result<T, TenantError>;
