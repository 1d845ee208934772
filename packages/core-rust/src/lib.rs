//! `TenantScope` Core: ambient tenant context, scoped queries, and write hooks
//! that keep every tenant's rows invisible to every other tenant.

pub mod config;
pub mod context;
pub mod database;
pub mod directory;
pub mod entity;
pub mod error;
pub mod hooks;
pub mod model;
pub mod query;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{IsolationConfig, MissingContextAccess, StampPolicy, UnscopedReadPolicy};
pub use context::{
    ContextFrame, CrossTenantScope, FrameExt, RequestGuard, RequestIdentity, TenantContextManager,
    TenantScope,
};
pub use database::Database;
pub use directory::{InMemoryDirectory, PrincipalDirectory, TenantDirectory};
pub use entity::{Entity, EntityKey, Row, TableMeta, TenantScoped, TENANT_ID_FIELD};
pub use error::{TenantError, TenantResult};
pub use hooks::{CompositeHook, LifecycleHook, TenantGuardHook, WriteOptions};
pub use model::TenantModel;
pub use query::{FilterState, ScopedQuery};
pub use traits::{Predicate, PredicateOp, QuerySpec, Session};
pub use types::{CredentialClaims, Principal, PrincipalId, Role, Tenant, TenantId};
