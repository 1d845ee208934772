//! Reads and writes the context store and answers tenant questions.

use std::sync::Arc;

use tracing::{debug, warn};

use super::scope::{CrossTenantScope, TenantScope};
use super::store;
use crate::config::{IsolationConfig, MissingContextAccess};
use crate::directory::{PrincipalDirectory, TenantDirectory};
use crate::error::{TenantError, TenantResult};
use crate::types::{Principal, PrincipalId, Tenant, TenantId};

/// Entry point for everything that reads or changes the ambient tenant.
///
/// Shared as `Arc<TenantContextManager>`; the state it manages lives in the
/// thread's context frame, not in the manager.
pub struct TenantContextManager {
    tenants: Arc<dyn TenantDirectory>,
    principals: Arc<dyn PrincipalDirectory>,
    config: IsolationConfig,
}

impl std::fmt::Debug for TenantContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContextManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TenantContextManager {
    #[must_use]
    pub fn new(tenants: Arc<dyn TenantDirectory>, principals: Arc<dyn PrincipalDirectory>) -> Self {
        Self {
            tenants,
            principals,
            config: IsolationConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: IsolationConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    /// Resolve the current tenant. First match wins:
    ///
    /// 1. the cross-cutting slot (`set_tenant_id`, scoped activation)
    /// 2. the request-local mirror
    /// 3. the `tenant_id` claim of the caller's credential, cached into 2
    /// 4. the principal's first membership, cached into 2
    ///
    /// Inside a cross-tenant scope only 1 and 2 are consulted. Lookup
    /// failures count as "no source"; this never errors.
    #[must_use]
    pub fn get_current_tenant_id(&self) -> Option<TenantId> {
        if let Some(tenant_id) = store::active_tenant() {
            return Some(tenant_id);
        }
        if let Some(tenant_id) = store::request_tenant() {
            return Some(tenant_id);
        }
        if store::is_cross_tenant() {
            return None;
        }

        let identity = store::request_identity()?;

        if let Some(tenant_id) = identity.claims.as_ref().and_then(|c| c.tenant_id) {
            store::cache_request_tenant(tenant_id);
            return Some(tenant_id);
        }

        let principal_id = identity.principal_id?;
        match self.principals.get_principal(principal_id) {
            Ok(Some(principal)) => {
                let tenant_id = principal.tenant_ids.first().copied()?;
                store::cache_request_tenant(tenant_id);
                Some(tenant_id)
            }
            Ok(None) => None,
            Err(error) => {
                debug!(%principal_id, %error, "principal lookup failed during tenant resolution");
                None
            }
        }
    }

    /// The current tenant record, if one resolves and exists.
    #[must_use]
    pub fn get_current_tenant(&self) -> Option<Tenant> {
        let tenant_id = self.get_current_tenant_id()?;
        match self.tenants.get_tenant(tenant_id) {
            Ok(tenant) => tenant,
            Err(error) => {
                debug!(%tenant_id, %error, "tenant lookup failed");
                None
            }
        }
    }

    /// Write both the cross-cutting slot and the request-local mirror.
    pub fn set_tenant_id(&self, tenant_id: Option<TenantId>) {
        store::set_tenant_id(tenant_id);
    }

    pub fn clear_tenant_context(&self) {
        store::clear_tenant_context();
    }

    /// Activate `tenant_id` until the returned scope is dropped.
    pub fn tenant_context(&self, tenant_id: TenantId) -> TenantScope {
        let previous = self.get_current_tenant_id();
        TenantScope::activate(tenant_id, previous)
    }

    /// Run `f` as `tenant_id`, restoring the previous context afterwards.
    pub fn with_tenant<T>(&self, tenant_id: TenantId, f: impl FnOnce() -> T) -> T {
        let _scope = self.tenant_context(tenant_id);
        f()
    }

    /// The current tenant, or a no-context error naming `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoContext`] when nothing resolves.
    pub fn require_tenant_id(&self, operation: &'static str) -> TenantResult<TenantId> {
        self.get_current_tenant_id()
            .ok_or(TenantError::NoContext { operation })
    }

    /// Run `f` with the current tenant, failing hard if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::NoContext`] when nothing resolves, otherwise
    /// whatever `f` returns.
    pub fn require_tenant<T>(
        &self,
        f: impl FnOnce(TenantId) -> TenantResult<T>,
    ) -> TenantResult<T> {
        let tenant_id = self.require_tenant_id("require_tenant")?;
        f(tenant_id)
    }

    /// True iff the tenant exists and is active.
    #[must_use]
    pub fn validate_tenant_id(&self, tenant_id: TenantId) -> bool {
        match self.tenants.get_tenant(tenant_id) {
            Ok(Some(tenant)) => tenant.is_active,
            Ok(None) => false,
            Err(error) => {
                warn!(%tenant_id, %error, "tenant lookup failed during validation");
                false
            }
        }
    }

    /// Tenants `principal_id` may act in: every active tenant for an
    /// unrestricted principal, explicit memberships otherwise. Unknown
    /// principals get an empty list.
    ///
    /// # Errors
    ///
    /// Propagates directory failures.
    pub fn get_user_tenant_ids(&self, principal_id: PrincipalId) -> TenantResult<Vec<TenantId>> {
        let Some(principal) = self.principals.get_principal(principal_id)? else {
            return Ok(Vec::new());
        };
        self.tenant_ids_for(&principal)
    }

    pub(crate) fn tenant_ids_for(&self, principal: &Principal) -> TenantResult<Vec<TenantId>> {
        if principal.is_unrestricted() {
            Ok(self.tenants.active_tenant_ids()?)
        } else {
            Ok(principal.tenant_ids.clone())
        }
    }

    /// The authenticated principal of the current request, if any.
    #[must_use]
    pub fn current_principal(&self) -> Option<Principal> {
        let principal_id = store::request_identity()?.principal_id?;
        match self.principals.get_principal(principal_id) {
            Ok(principal) => principal,
            Err(error) => {
                debug!(%principal_id, %error, "principal lookup failed");
                None
            }
        }
    }

    #[must_use]
    pub fn current_principal_is_unrestricted(&self) -> bool {
        self.current_principal()
            .is_some_and(|principal| principal.is_unrestricted())
    }

    /// Enter an explicit cross-tenant administrative scope.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::AccessDenied`] unless the current principal is
    /// unrestricted.
    pub fn cross_tenant_scope(&self) -> TenantResult<CrossTenantScope> {
        if !self.current_principal_is_unrestricted() {
            return Err(TenantError::denied(
                None,
                "cross-tenant operations require an unrestricted principal",
            ));
        }
        debug!("entering cross-tenant scope");
        Ok(CrossTenantScope::enter())
    }

    /// Whether the acting context may touch a row owned by `owner`.
    ///
    /// `explicit` overrides ambient resolution. With no tenant at all, the
    /// configured [`MissingContextAccess`] rule decides.
    #[must_use]
    pub fn check_access(&self, owner: Option<TenantId>, explicit: Option<TenantId>) -> bool {
        match explicit.or_else(|| self.get_current_tenant_id()) {
            Some(tenant_id) => owner == Some(tenant_id),
            None => self.missing_context_grants_access(),
        }
    }

    fn missing_context_grants_access(&self) -> bool {
        let unrestricted = self.current_principal_is_unrestricted();
        match self.config.missing_context_access {
            MissingContextAccess::RequireCrossTenantScope => {
                unrestricted && store::is_cross_tenant()
            }
            MissingContextAccess::InferFromRole => unrestricted,
        }
    }
}
