use serde::{Deserialize, Serialize};

/// Header carrying the caller's requested tenant.
pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-ID";

/// Behavior of a terminal query on a tenant-scoped type when no tenant
/// context can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscopedReadPolicy {
    /// Fail with a no-context error. `without_tenant()` is the only way to
    /// read across tenants.
    #[default]
    FailClosed,
    /// Run the query unfiltered and log a warning. Intended for system jobs
    /// that legitimately run without a tenant.
    FailOpen,
}

/// How a write path handles a row with no tenant id when context is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampPolicy {
    /// Reject the write with a no-context error.
    Strict,
    /// Stamp when context is available, otherwise persist as-is.
    BestEffort,
}

/// Who may pass an access check when no tenant context is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingContextAccess {
    /// Only an unrestricted principal inside an explicit cross-tenant scope.
    #[default]
    RequireCrossTenantScope,
    /// Any unrestricted principal, whether or not it opted into a
    /// cross-tenant operation.
    InferFromRole,
}

/// Isolation policy knobs.
///
/// Defaults keep the single-insert and bulk-insert paths asymmetric
/// (strict vs best-effort); set both stamping fields to the same policy to
/// unify them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationConfig {
    pub unscoped_reads: UnscopedReadPolicy,
    pub insert_stamping: StampPolicy,
    pub bulk_insert_stamping: StampPolicy,
    pub missing_context_access: MissingContextAccess,
    pub tenant_header: String,
}

impl Default for IsolationConfig {
    fn default() -> Self {
        Self {
            unscoped_reads: UnscopedReadPolicy::FailClosed,
            insert_stamping: StampPolicy::Strict,
            bulk_insert_stamping: StampPolicy::BestEffort,
            missing_context_access: MissingContextAccess::RequireCrossTenantScope,
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
        }
    }
}
