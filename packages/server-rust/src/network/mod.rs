//! HTTP boundary: configuration, caller identity, per-request tenant
//! context, handlers and the server lifecycle.

pub mod claims;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod tenant_layer;

pub use claims::JwtIdentityResolver;
pub use config::*;
pub use handlers::{ApiError, AppState, CurrentTenant};
pub use module::NetworkModule;
pub use tenant_layer::{TenantLayer, TenantService};
