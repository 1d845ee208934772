//! Per-request setup and teardown.
//!
//! Every request starts from an empty frame carrying only the caller's
//! identity, optionally adopts the tenant named in the tenant header, and
//! ends with the frame discarded. Header problems are never reported to the
//! caller here; downstream code simply sees no context.

use std::marker::PhantomData;

use tracing::{debug, info, warn};

use super::frame::{enter, ContextFrame, RequestIdentity};
use super::manager::TenantContextManager;
use super::store;
use crate::error::{TenantError, TenantResult};
use crate::types::TenantId;

/// Keeps a request's context installed on the current thread.
///
/// Dropping it, on success, error or panic, resets the thread to an empty
/// frame.
#[must_use = "the request context is torn down when the guard is dropped"]
pub struct RequestGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        store::replace(ContextFrame::new());
    }
}

impl TenantContextManager {
    /// Start a request on the current thread.
    ///
    /// Whatever a previous unit of work left on this thread is discarded
    /// before `identity` is installed and `tenant_header` is applied.
    pub fn begin_request(
        &self,
        identity: RequestIdentity,
        tenant_header: Option<&str>,
    ) -> RequestGuard {
        let residual = store::replace(ContextFrame::for_request(identity));
        if !residual.is_clear() {
            debug!("discarded residual tenant context from a previous unit of work");
        }
        self.apply_tenant_header(tenant_header);
        RequestGuard {
            _not_send: PhantomData,
        }
    }

    /// Build the frame a request should run in without touching the current
    /// thread's context. Used by async integrations that carry the frame
    /// alongside the request future.
    #[must_use]
    pub fn request_frame(
        &self,
        identity: RequestIdentity,
        tenant_header: Option<&str>,
    ) -> ContextFrame {
        let guard = enter(ContextFrame::for_request(identity));
        self.apply_tenant_header(tenant_header);
        guard.exit()
    }

    /// Adopt the tenant named by a raw header value if the current
    /// principal may act in it. Returns the adopted tenant.
    pub fn apply_tenant_header(&self, raw: Option<&str>) -> Option<TenantId> {
        let raw = raw?;
        let Ok(tenant_id) = raw.parse::<TenantId>() else {
            warn!(header = raw, "ignoring malformed tenant header");
            return None;
        };
        let Some(principal_id) = store::request_identity().and_then(|i| i.principal_id) else {
            debug!(%tenant_id, "ignoring tenant header on an unauthenticated request");
            return None;
        };

        match self.get_user_tenant_ids(principal_id) {
            Ok(allowed) if allowed.contains(&tenant_id) => {
                self.set_tenant_id(Some(tenant_id));
                debug!(%tenant_id, %principal_id, "tenant adopted from header");
                Some(tenant_id)
            }
            Ok(_) => {
                warn!(%tenant_id, %principal_id, "ignoring tenant header outside principal memberships");
                None
            }
            Err(error) => {
                warn!(%tenant_id, %principal_id, %error, "membership lookup failed for tenant header");
                None
            }
        }
    }

    /// Pivot the current request to another tenant.
    ///
    /// # Errors
    ///
    /// Returns [`TenantError::AccessDenied`] when there is no authenticated
    /// principal or `tenant_id` is outside its memberships. The context is
    /// left unchanged on failure.
    pub fn switch_tenant(&self, tenant_id: TenantId) -> TenantResult<()> {
        let principal = self.current_principal().ok_or(TenantError::denied(
            Some(tenant_id),
            "switching tenants requires an authenticated principal",
        ))?;

        if !self.tenant_ids_for(&principal)?.contains(&tenant_id) {
            return Err(TenantError::denied(
                Some(tenant_id),
                "principal is not a member of the requested tenant",
            ));
        }

        self.set_tenant_id(Some(tenant_id));
        info!(%tenant_id, principal_id = %principal.id, "switched tenant");
        Ok(())
    }
}
