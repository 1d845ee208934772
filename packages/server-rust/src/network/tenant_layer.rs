//! Per-request tenant context for the HTTP stack.
//!
//! Every request gets a fresh [`ContextFrame`] built from the caller's
//! identity and the tenant header, and the inner service runs inside that
//! frame for every poll of its future. The frame is dropped with the
//! future, so nothing a request resolves can be observed by the next one,
//! whichever worker thread it lands on.

use std::sync::Arc;
use std::task::{Context, Poll};

use http::Request;
use tenantscope_core::context::{enter, FrameExt, Framed};
use tenantscope_core::TenantContextManager;
use tower::{Layer, Service};

use super::claims::JwtIdentityResolver;

// ---------------------------------------------------------------------------
// TenantLayer
// ---------------------------------------------------------------------------

/// Tower layer that installs request-scoped tenant context.
#[derive(Debug, Clone)]
pub struct TenantLayer {
    manager: Arc<TenantContextManager>,
    resolver: Arc<JwtIdentityResolver>,
}

impl TenantLayer {
    #[must_use]
    pub fn new(manager: Arc<TenantContextManager>, resolver: JwtIdentityResolver) -> Self {
        Self {
            manager,
            resolver: Arc::new(resolver),
        }
    }
}

impl<S> Layer<S> for TenantLayer {
    type Service = TenantService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantService {
            inner,
            manager: Arc::clone(&self.manager),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

// ---------------------------------------------------------------------------
// TenantService
// ---------------------------------------------------------------------------

/// Service wrapper that runs `inner` inside the request's context frame.
#[derive(Debug, Clone)]
pub struct TenantService<S> {
    inner: S,
    manager: Arc<TenantContextManager>,
    resolver: Arc<JwtIdentityResolver>,
}

impl<S, B> Service<Request<B>> for TenantService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Framed<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let identity = self.resolver.resolve(request.headers());
        let header = request
            .headers()
            .get(self.manager.config().tenant_header.as_str())
            .and_then(|value| value.to_str().ok());
        let frame = self.manager.request_frame(identity, header);

        // Some services do work synchronously in `call`; it must see the
        // request's frame too.
        let guard = enter(frame);
        let future = self.inner.call(request);
        future.in_frame(guard.exit())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::routing::get;
    use axum::Router;
    use tenantscope_core::TenantId;
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{manager, token_for, MEMBER, SECRET};

    fn app(manager: &Arc<TenantContextManager>) -> Router {
        let current = Arc::clone(manager);
        Router::new()
            .route(
                "/whoami",
                get(move || {
                    let manager = Arc::clone(&current);
                    async move {
                        tokio::task::yield_now().await;
                        manager
                            .get_current_tenant_id()
                            .map_or_else(|| "none".to_string(), |id| id.to_string())
                    }
                }),
            )
            .layer(TenantLayer::new(
                Arc::clone(manager),
                JwtIdentityResolver::new(Some(SECRET)),
            ))
    }

    async fn whoami(app: Router, token: Option<&str>, tenant: Option<&str>) -> String {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(tenant) = tenant {
            builder = builder.header("X-Tenant-ID", tenant);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn member_header_is_adopted() {
        let manager = Arc::new(manager());
        let token = token_for(&MEMBER.to_string(), SECRET, 3600, None);
        assert_eq!(whoami(app(&manager), Some(&token), Some("2")).await, "2");
    }

    #[tokio::test]
    async fn foreign_or_malformed_header_falls_back_to_default_tenant() {
        let manager = Arc::new(manager());
        let token = token_for(&MEMBER.to_string(), SECRET, 3600, None);
        assert_eq!(whoami(app(&manager), Some(&token), Some("9")).await, "1");
        assert_eq!(whoami(app(&manager), Some(&token), Some("acme")).await, "1");
    }

    #[tokio::test]
    async fn claim_tenant_resolves_without_header() {
        let manager = Arc::new(manager());
        let token = token_for(&MEMBER.to_string(), SECRET, 3600, Some(TenantId(2)));
        assert_eq!(whoami(app(&manager), Some(&token), None).await, "2");
    }

    #[tokio::test]
    async fn anonymous_header_is_ignored() {
        let manager = Arc::new(manager());
        assert_eq!(whoami(app(&manager), None, Some("2")).await, "none");
    }

    #[tokio::test]
    async fn requests_do_not_leak_into_each_other_or_the_caller() {
        let manager = Arc::new(manager());
        let token = token_for(&MEMBER.to_string(), SECRET, 3600, None);

        assert_eq!(whoami(app(&manager), Some(&token), Some("2")).await, "2");
        assert_eq!(whoami(app(&manager), Some(&token), None).await, "1");
        assert_eq!(whoami(app(&manager), None, None).await, "none");
        assert_eq!(manager.get_current_tenant_id(), None);
    }
}
