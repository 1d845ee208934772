//! HTTP rendering of isolation failures.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tenantscope_core::TenantError;
use tracing::error;

/// Error type returned by every handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Tenant(#[from] TenantError),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl ApiError {
    /// Status and machine-readable code for this error.
    #[must_use]
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Tenant(err) if err.is_no_context() => (StatusCode::BAD_REQUEST, "tenant_required"),
            Self::Tenant(err) if err.is_access_denied() => (StatusCode::FORBIDDEN, "tenant_forbidden"),
            Self::Tenant(TenantError::NoResult { .. }) | Self::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Self::Tenant(TenantError::MalformedRecord { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "malformed_record")
            }
            Self::Tenant(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}
