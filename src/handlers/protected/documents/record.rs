// handlers/protected/documents/record.rs - /api/documents and /api/documents/:id handlers

use axum::{extract::State, Extension};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::database::models::{DocumentAnalysis, DocumentWithAnalyses, FinancialDocument};
use crate::database::Page;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::{DocumentListQuery, DocumentQuery};
use crate::services::DocumentService;
use crate::state::AppState;
use crate::validation::{ValidatedPath, ValidatedQuery};

/// GET /api/documents - Paginated listing, newest first
///
/// Query: `page`, `limit`, `documentType`, `status`
pub async fn list_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<DocumentListQuery>,
) -> ApiResult<Page<FinancialDocument>> {
    let page = DocumentService::new(&state).list(auth.user_id, query).await?;
    Ok(ApiResponse::success(page))
}

/// GET /api/documents/:id - One document with its analyses
///
/// The base64 content is only included with `?includeContent=true`.
pub async fn document_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedQuery(query): ValidatedQuery<DocumentQuery>,
) -> ApiResult<DocumentWithAnalyses> {
    let document = DocumentService::new(&state)
        .get(auth.user_id, id, query.include_content)
        .await?;
    Ok(ApiResponse::success(document))
}

/// GET /api/documents/:id/analyses - Analyses of one document, newest first
pub async fn analyses_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> ApiResult<Vec<DocumentAnalysis>> {
    let analyses = DocumentService::new(&state).analyses(auth.user_id, id).await?;
    Ok(ApiResponse::success(analyses))
}

/// DELETE /api/documents/:id - Remove a document and its analyses
pub async fn document_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedPath(id): ValidatedPath<Uuid>,
) -> ApiResult<Value> {
    DocumentService::new(&state).delete(auth.user_id, id).await?;
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })).with_message("Document deleted"))
}
