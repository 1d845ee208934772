//! Per-unit-of-work context frames.
//!
//! A [`ContextFrame`] is everything the isolation layer knows about the
//! current unit of work: the cross-cutting tenant slot, the cross-tenant
//! flag, and (while a request is in flight) the request-local mirror plus the
//! caller's identity. Exactly one frame is installed per thread; [`enter`]
//! swaps a frame in and [`Framed`] does so around every poll of a future, so
//! a request's context follows it across worker threads and is dropped with
//! it.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::store;
use crate::types::{CredentialClaims, PrincipalId, TenantId};

/// Who is calling, as established by the authentication collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    pub principal_id: Option<PrincipalId>,
    /// Verified claims of the signed credential, if one was presented.
    pub claims: Option<CredentialClaims>,
}

impl RequestIdentity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn principal(principal_id: PrincipalId) -> Self {
        Self {
            principal_id: Some(principal_id),
            claims: None,
        }
    }

    #[must_use]
    pub fn with_claims(mut self, claims: CredentialClaims) -> Self {
        self.claims = Some(claims);
        self
    }
}

/// Request-local state: the resolved tenant cache and the caller identity.
#[derive(Debug, Clone, Default)]
pub(crate) struct RequestLocal {
    pub(crate) tenant_id: Option<TenantId>,
    pub(crate) identity: RequestIdentity,
}

/// Tenant context of one unit of work.
#[derive(Debug, Clone, Default)]
pub struct ContextFrame {
    /// Cross-cutting slot written by `set_tenant_id` and scoped activation.
    pub(crate) active: Option<TenantId>,
    /// Set only inside an explicit cross-tenant scope.
    pub(crate) cross_tenant: bool,
    /// Present while a request is in flight.
    pub(crate) request: Option<RequestLocal>,
}

impl ContextFrame {
    /// An empty frame with no request attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty frame for a request made by `identity`.
    #[must_use]
    pub fn for_request(identity: RequestIdentity) -> Self {
        Self {
            active: None,
            cross_tenant: false,
            request: Some(RequestLocal {
                tenant_id: None,
                identity,
            }),
        }
    }

    #[must_use]
    pub fn with_active_tenant(mut self, tenant_id: TenantId) -> Self {
        self.active = Some(tenant_id);
        self
    }

    /// Seed the request-local cache, attaching an anonymous request if the
    /// frame has none.
    #[must_use]
    pub fn with_request_tenant(mut self, tenant_id: TenantId) -> Self {
        self.request.get_or_insert_with(RequestLocal::default).tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn active_tenant(&self) -> Option<TenantId> {
        self.active
    }

    #[must_use]
    pub fn request_tenant(&self) -> Option<TenantId> {
        self.request.as_ref().and_then(|r| r.tenant_id)
    }

    #[must_use]
    pub fn identity(&self) -> Option<&RequestIdentity> {
        self.request.as_ref().map(|r| &r.identity)
    }

    #[must_use]
    pub fn is_cross_tenant(&self) -> bool {
        self.cross_tenant
    }

    /// True when no tenant value is held in either slot.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.active.is_none() && self.request_tenant().is_none() && !self.cross_tenant
    }
}

/// Install `frame` on the current thread until the guard is dropped or
/// exited.
#[must_use = "the frame is uninstalled when the guard is dropped"]
pub fn enter(frame: ContextFrame) -> FrameGuard {
    let previous = store::replace(frame);
    FrameGuard {
        previous: Some(previous),
        _not_send: PhantomData,
    }
}

/// Restores the thread's previous frame when dropped.
///
/// Tied to the thread it was created on.
pub struct FrameGuard {
    previous: Option<ContextFrame>,
    _not_send: PhantomData<*const ()>,
}

impl FrameGuard {
    /// Uninstall the frame, returning it with any changes made while it was
    /// active.
    #[must_use]
    pub fn exit(mut self) -> ContextFrame {
        store::replace(self.previous.take().unwrap_or_default())
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            store::replace(previous);
        }
    }
}

/// Future that runs every poll of `inner` with its own frame installed.
///
/// Created by [`FrameExt::in_frame`]. The frame travels with the future, so
/// a task resumed on a different worker thread still sees its own context
/// and never the context of whatever ran on that thread before.
pub struct Framed<F> {
    inner: Pin<Box<F>>,
    frame: Option<ContextFrame>,
}

impl<F: Future> Future for Framed<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let guard = enter(this.frame.take().unwrap_or_default());
        let poll = this.inner.as_mut().poll(cx);
        this.frame = Some(guard.exit());
        poll
    }
}

/// Attach a context frame to a future.
pub trait FrameExt: Future + Sized {
    fn in_frame(self, frame: ContextFrame) -> Framed<Self> {
        Framed {
            inner: Box::pin(self),
            frame: Some(frame),
        }
    }
}

impl<F: Future> FrameExt for F {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_and_exit_swap_frames() {
        let _reset = enter(ContextFrame::new());

        let guard = enter(ContextFrame::new().with_active_tenant(TenantId(4)));
        assert_eq!(store::active_tenant(), Some(TenantId(4)));
        store::set_tenant_id(Some(TenantId(5)));

        let frame = guard.exit();
        assert_eq!(frame.active_tenant(), Some(TenantId(5)));
        assert_eq!(store::active_tenant(), None);
    }

    #[test]
    fn dropped_guard_restores_previous_frame() {
        let _outer = enter(ContextFrame::new().with_active_tenant(TenantId(1)));
        {
            let _inner = enter(ContextFrame::new().with_active_tenant(TenantId(2)));
            assert_eq!(store::active_tenant(), Some(TenantId(2)));
        }
        assert_eq!(store::active_tenant(), Some(TenantId(1)));
    }

    #[test]
    fn with_request_tenant_attaches_request() {
        let frame = ContextFrame::new().with_request_tenant(TenantId(8));
        assert_eq!(frame.request_tenant(), Some(TenantId(8)));
        assert_eq!(frame.identity(), Some(&RequestIdentity::anonymous()));
        assert!(!frame.is_clear());
    }

    #[tokio::test]
    async fn framed_future_sees_its_frame_across_awaits() {
        let _reset = enter(ContextFrame::new());

        let seen = async {
            let before = store::active_tenant();
            tokio::task::yield_now().await;
            store::set_tenant_id(Some(TenantId(9)));
            tokio::task::yield_now().await;
            (before, store::active_tenant())
        }
        .in_frame(ContextFrame::new().with_active_tenant(TenantId(3)))
        .await;

        assert_eq!(seen, (Some(TenantId(3)), Some(TenantId(9))));
        assert_eq!(store::active_tenant(), None);
    }

    #[tokio::test]
    async fn framed_futures_do_not_observe_each_other() {
        let _reset = enter(ContextFrame::new());

        let a = async {
            tokio::task::yield_now().await;
            store::active_tenant()
        }
        .in_frame(ContextFrame::new().with_active_tenant(TenantId(1)));
        let b = async {
            tokio::task::yield_now().await;
            store::active_tenant()
        }
        .in_frame(ContextFrame::new().with_active_tenant(TenantId(2)));

        let (a, b) = tokio::join!(a, b);
        assert_eq!(a, Some(TenantId(1)));
        assert_eq!(b, Some(TenantId(2)));
    }
}
