//! Current-tenant inspection and switching.
//!
//! A switch only lasts for the request that makes it: each request starts
//! from a fresh frame, so clients keep acting in the new tenant by sending
//! it in the tenant header.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tenantscope_core::{PrincipalId, Tenant, TenantContextManager, TenantId, TenantResult};

use super::{ApiError, AppState};

/// What the isolation layer resolved for this request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub tenant_id: Option<TenantId>,
    pub tenant: Option<Tenant>,
    pub principal_id: Option<PrincipalId>,
    pub memberships: Vec<TenantId>,
}

impl TenantInfo {
    fn resolve(manager: &TenantContextManager) -> TenantResult<Self> {
        let principal = manager.current_principal();
        let memberships = match &principal {
            Some(principal) => manager.get_user_tenant_ids(principal.id)?,
            None => Vec::new(),
        };
        Ok(Self {
            tenant_id: manager.get_current_tenant_id(),
            tenant: manager.get_current_tenant(),
            principal_id: principal.map(|p| p.id),
            memberships,
        })
    }
}

/// Body of `POST /tenant/switch`.
#[derive(Debug, Deserialize)]
pub struct SwitchTenant {
    pub tenant_id: TenantId,
}

pub async fn current_tenant_handler(
    State(state): State<AppState>,
) -> Result<Json<TenantInfo>, ApiError> {
    Ok(Json(TenantInfo::resolve(state.db.manager())?))
}

pub async fn switch_tenant_handler(
    State(state): State<AppState>,
    Json(input): Json<SwitchTenant>,
) -> Result<Json<TenantInfo>, ApiError> {
    let manager = state.db.manager();
    manager.switch_tenant(input.tenant_id)?;
    Ok(Json(TenantInfo::resolve(manager)?))
}
