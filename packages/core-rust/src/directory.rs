//! Lookups the isolation layer consumes but does not own.
//!
//! Tenants and principals are managed by administrative flows elsewhere;
//! the context manager only reads them through these traits.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::types::{Principal, PrincipalId, Tenant, TenantId};

/// Read access to tenants.
pub trait TenantDirectory: Send + Sync {
    /// Look up a tenant by id, active or not.
    fn get_tenant(&self, id: TenantId) -> anyhow::Result<Option<Tenant>>;

    /// Ids of every active tenant, in ascending order.
    fn active_tenant_ids(&self) -> anyhow::Result<Vec<TenantId>>;
}

/// Read access to principals and their memberships.
pub trait PrincipalDirectory: Send + Sync {
    fn get_principal(&self, id: PrincipalId) -> anyhow::Result<Option<Principal>>;
}

/// In-memory directory backing both lookups.
///
/// Ordered maps keep `active_tenant_ids` deterministic.
#[derive(Default)]
pub struct InMemoryDirectory {
    tenants: RwLock<BTreeMap<TenantId, Tenant>>,
    principals: RwLock<BTreeMap<PrincipalId, Principal>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant.
    pub fn upsert_tenant(&self, tenant: Tenant) {
        self.tenants.write().insert(tenant.id, tenant);
    }

    /// Insert or replace a principal.
    pub fn upsert_principal(&self, principal: Principal) {
        self.principals.write().insert(principal.id, principal);
    }

    /// Flip a tenant's active flag. Returns `false` if the tenant is unknown.
    pub fn set_tenant_active(&self, id: TenantId, is_active: bool) -> bool {
        match self.tenants.write().get_mut(&id) {
            Some(tenant) => {
                tenant.is_active = is_active;
                true
            }
            None => false,
        }
    }
}

impl TenantDirectory for InMemoryDirectory {
    fn get_tenant(&self, id: TenantId) -> anyhow::Result<Option<Tenant>> {
        Ok(self.tenants.read().get(&id).cloned())
    }

    fn active_tenant_ids(&self) -> anyhow::Result<Vec<TenantId>> {
        Ok(self
            .tenants
            .read()
            .values()
            .filter(|t| t.is_active)
            .map(|t| t.id)
            .collect())
    }
}

impl PrincipalDirectory for InMemoryDirectory {
    fn get_principal(&self, id: PrincipalId) -> anyhow::Result<Option<Principal>> {
        Ok(self.principals.read().get(&id).cloned())
    }
}
