//! Thread-local context store.
//!
//! Each thread holds exactly one [`ContextFrame`]. Only the context manager,
//! scope guards, and frame guards mutate it; everything else reads.

use std::cell::RefCell;

use super::frame::{ContextFrame, RequestIdentity};
use crate::types::TenantId;

thread_local! {
    static FRAME: RefCell<ContextFrame> = RefCell::new(ContextFrame::default());
}

/// Swap the thread's frame, returning the one it replaced.
pub(crate) fn replace(frame: ContextFrame) -> ContextFrame {
    FRAME.with(|cell| cell.replace(frame))
}

fn read<R>(f: impl FnOnce(&ContextFrame) -> R) -> R {
    FRAME.with(|cell| f(&cell.borrow()))
}

fn write<R>(f: impl FnOnce(&mut ContextFrame) -> R) -> R {
    FRAME.with(|cell| f(&mut cell.borrow_mut()))
}

/// Copy of the current thread's frame.
#[must_use]
pub fn snapshot() -> ContextFrame {
    read(ContextFrame::clone)
}

/// Value of the cross-cutting slot.
#[must_use]
pub fn active_tenant() -> Option<TenantId> {
    read(|frame| frame.active)
}

/// Value of the request-local mirror, if a request is in flight.
#[must_use]
pub fn request_tenant() -> Option<TenantId> {
    read(ContextFrame::request_tenant)
}

#[must_use]
pub fn request_identity() -> Option<RequestIdentity> {
    read(|frame| frame.identity().cloned())
}

#[must_use]
pub fn in_request() -> bool {
    read(|frame| frame.request.is_some())
}

#[must_use]
pub fn is_cross_tenant() -> bool {
    read(|frame| frame.cross_tenant)
}

/// Write `tenant_id` to the cross-cutting slot and the request-local mirror.
pub fn set_tenant_id(tenant_id: Option<TenantId>) {
    write(|frame| {
        frame.active = tenant_id;
        if let Some(request) = frame.request.as_mut() {
            request.tenant_id = tenant_id;
        }
    });
}

/// Remove the tenant from both slots. The request identity and any
/// cross-tenant scope survive.
pub fn clear_tenant_context() {
    write(|frame| {
        frame.active = None;
        if let Some(request) = frame.request.as_mut() {
            request.tenant_id = None;
        }
    });
}

/// Cache a lazily resolved tenant in the request-local mirror only.
pub(crate) fn cache_request_tenant(tenant_id: TenantId) {
    write(|frame| {
        if let Some(request) = frame.request.as_mut() {
            request.tenant_id = Some(tenant_id);
        }
    });
}

/// Tenant slots saved by a cross-tenant scope.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SavedSlots {
    active: Option<TenantId>,
    request: Option<TenantId>,
    cross_tenant: bool,
}

/// Empty both slots and raise the cross-tenant flag, returning what was
/// there before.
pub(crate) fn enter_cross_tenant() -> SavedSlots {
    write(|frame| {
        let saved = SavedSlots {
            active: frame.active.take(),
            request: frame.request.as_mut().and_then(|r| r.tenant_id.take()),
            cross_tenant: frame.cross_tenant,
        };
        frame.cross_tenant = true;
        saved
    })
}

pub(crate) fn restore_slots(saved: SavedSlots) {
    write(|frame| {
        frame.active = saved.active;
        frame.cross_tenant = saved.cross_tenant;
        if let Some(request) = frame.request.as_mut() {
            request.tenant_id = saved.request;
        }
    });
}
