//! RAII guards for scoped tenant activation.

use std::fmt;
use std::marker::PhantomData;

use super::store;
use crate::types::TenantId;

/// Runs the enclosing block as one tenant.
///
/// Created by `TenantContextManager::tenant_context`. On drop, including
/// during unwinding, the previously resolved tenant is restored, or the
/// context is cleared if there was none. Scopes nest.
#[must_use = "the tenant is deactivated when the scope is dropped"]
#[derive(Debug)]
pub struct TenantScope {
    tenant_id: TenantId,
    previous: Option<TenantId>,
    _not_send: PhantomData<*const ()>,
}

impl TenantScope {
    pub(crate) fn activate(tenant_id: TenantId, previous: Option<TenantId>) -> Self {
        store::set_tenant_id(Some(tenant_id));
        Self {
            tenant_id,
            previous,
            _not_send: PhantomData,
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    #[must_use]
    pub fn previous(&self) -> Option<TenantId> {
        self.previous
    }
}

impl Drop for TenantScope {
    fn drop(&mut self) {
        match self.previous {
            Some(previous) => store::set_tenant_id(Some(previous)),
            None => store::clear_tenant_context(),
        }
    }
}

/// Explicit opt-in to a cross-tenant administrative operation.
///
/// While held, both tenant slots are empty and ambient resolution stops
/// before credential claims and memberships, so nothing re-scopes the work
/// behind the caller's back. Created by
/// `TenantContextManager::cross_tenant_scope`, which only grants it to
/// unrestricted principals.
#[must_use = "cross-tenant mode ends when the scope is dropped"]
pub struct CrossTenantScope {
    saved: Option<store::SavedSlots>,
    _not_send: PhantomData<*const ()>,
}

impl CrossTenantScope {
    pub(crate) fn enter() -> Self {
        Self {
            saved: Some(store::enter_cross_tenant()),
            _not_send: PhantomData,
        }
    }
}

impl fmt::Debug for CrossTenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossTenantScope")
            .field("active", &self.saved.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for CrossTenantScope {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            store::restore_slots(saved);
        }
    }
}
