//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` assembles shared state,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. Callers can seed storage or inspect the bound port between
//! `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tenantscope_core::Database;
use tokio::net::TcpListener;
use tracing::info;

use super::claims::JwtIdentityResolver;
use super::config::NetworkConfig;
use super::handlers::{
    create_document, current_tenant_handler, delete_document, get_document, health_handler,
    list_documents, liveness_handler, switch_tenant_handler, AppState,
};
use super::middleware::with_http_layers;
use super::tenant_layer::TenantLayer;

/// Manages the HTTP server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()`: takes the configuration and the tenant-aware database
/// 2. `start()`: binds TCP listener to the configured address
/// 3. `serve()`: begins accepting connections until shutdown is signalled
pub struct NetworkModule {
    config: NetworkConfig,
    db: Database,
    listener: Option<TcpListener>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, db: Database) -> Self {
        Self {
            config,
            db,
            listener: None,
        }
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health`: process health JSON
    /// - `GET /health/live`: Kubernetes liveness probe
    /// - `GET /tenant`: tenant resolved for the request
    /// - `POST /tenant/switch`: pivot the request to another member tenant
    /// - `GET|POST /documents`, `GET|DELETE /documents/{id}`: tenant-scoped documents
    ///
    /// Health routes sit outside the tenant layer; every other route runs
    /// inside a per-request context frame.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            db: self.db.clone(),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        let manager = self.db.shared_manager();
        let tenant_header = manager.config().tenant_header.clone();
        let tenant_layer = TenantLayer::new(
            manager,
            JwtIdentityResolver::new(self.config.jwt_secret.as_deref()),
        );

        let scoped = Router::new()
            .route("/tenant", get(current_tenant_handler))
            .route("/tenant/switch", post(switch_tenant_handler))
            .route("/documents", get(list_documents).post(create_document))
            .route("/documents/{id}", get(get_document).delete(delete_document))
            .layer(tenant_layer);

        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .merge(scoped);
        with_http_layers(router, &self.config, &tenant_header).with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until the shutdown signal fires, then lets
    /// in-flight requests finish.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server
    /// encounters a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();

        info!(
            authenticated = self.config.jwt_secret.is_some(),
            "serving HTTP connections"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::demo::seed_documents;
    use crate::test_support::{database, token_for, MEMBER, SECRET};

    fn module() -> NetworkModule {
        let config = NetworkConfig {
            jwt_secret: Some(SECRET.to_string()),
            ..NetworkConfig::default()
        };
        let db = database();
        seed_documents(&db).unwrap();
        NetworkModule::new(config, db)
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module();
        assert!(module.listener.is_none());
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module();
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module()
            .serve(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("start() must be called"));
    }

    #[tokio::test]
    async fn liveness_needs_no_tenant() {
        let response = module()
            .build_router()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn documents_without_identity_are_rejected() {
        let response = module()
            .build_router()
            .oneshot(Request::get("/documents").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn documents_follow_tenant_header() {
        let token = token_for(&MEMBER.to_string(), SECRET, 3600, None);
        let request = Request::get("/documents")
            .header("Authorization", format!("Bearer {token}"))
            .header("X-Tenant-ID", "2")
            .body(Body::empty())
            .unwrap();

        let response = module().build_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let docs: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d["tenant_id"] == 2));
    }
}
