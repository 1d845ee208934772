//! HTTP middleware for the tenantscope server.
//!
//! Tenant context is installed per route by
//! [`TenantLayer`](super::tenant_layer::TenantLayer), inside everything
//! applied here.

use axum::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID: &str = "x-request-id";

/// Wraps `router` in the HTTP-level middleware.
///
/// Outermost to innermost:
/// 1. `SetRequestId`: assigns a UUID v4 `X-Request-Id` to every incoming request
/// 2. `Tracing`: structured request/response spans
/// 3. `CORS`: configured origins, credentials and the tenant header
/// 4. `Timeout`: answers `408` once the configured duration elapses
/// 5. `PropagateRequestId`: copies `X-Request-Id` onto the response
///
/// Axum wraps each `layer` call around the previous ones, so they are
/// applied innermost first.
pub fn with_http_layers<S>(
    router: Router<S>,
    config: &NetworkConfig,
    tenant_header: &str,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID);

    router
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(build_cors_layer(&config.cors_origins, tenant_header))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// A wildcard `"*"` allows any origin; otherwise only the parsable entries
/// are allowed. An unparsable tenant header name is left out of the
/// allowed headers.
fn build_cors_layer(origins: &[String], tenant_header: &str) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    let mut headers = vec![AUTHORIZATION, CONTENT_TYPE];
    headers.extend(HeaderName::try_from(tenant_header).ok());

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(headers)
}
