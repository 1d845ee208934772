//! Document endpoints. Every read and write is confined to the request's
//! tenant.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tenantscope_core::{EntityKey, TenantModel};

use super::{ApiError, AppState, CurrentTenant};
use crate::domain::{Document, DocumentView};

/// Body of `POST /documents`.
#[derive(Debug, Deserialize)]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub body: String,
}

pub async fn list_documents(
    State(state): State<AppState>,
    CurrentTenant(tenant_id): CurrentTenant,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    let docs = Document::for_tenant(&state.db, Some(tenant_id))?.all()?;
    Ok(Json(docs.into_iter().map(DocumentView::from).collect()))
}

pub async fn create_document(
    State(state): State<AppState>,
    CurrentTenant(tenant_id): CurrentTenant,
    Json(input): Json<NewDocument>,
) -> Result<(StatusCode, Json<DocumentView>), ApiError> {
    let fields = Document::fields(&input.title, &input.body);
    let mut doc = Document::create_for_tenant(&state.db, Some(tenant_id), fields)?;
    doc.save(&state.db, true)?;
    Ok((StatusCode::CREATED, Json(doc.into())))
}

/// Rows of other tenants are reported as missing, never as forbidden.
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<EntityKey>,
) -> Result<Json<DocumentView>, ApiError> {
    let doc = state
        .db
        .get::<Document>(id)?
        .ok_or(ApiError::NotFound("document"))?;
    Ok(Json(doc.into()))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<EntityKey>,
) -> Result<StatusCode, ApiError> {
    let doc = state
        .db
        .get::<Document>(id)?
        .ok_or(ApiError::NotFound("document"))?;
    doc.delete(&state.db, true)?;
    Ok(StatusCode::NO_CONTENT)
}
