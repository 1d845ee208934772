//! Ambient tenant context: where the current tenant lives, how it is
//! resolved, and how it is scoped to a unit of work.

pub mod frame;
pub mod manager;
pub mod request;
pub mod scope;
pub mod store;

pub use frame::{enter, ContextFrame, FrameExt, FrameGuard, Framed, RequestIdentity};
pub use manager::TenantContextManager;
pub use request::RequestGuard;
pub use scope::{CrossTenantScope, TenantScope};
