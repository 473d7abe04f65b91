// handlers/protected/documents/analyze.rs - POST /api/documents/:id/analyze handler

use axum::{extract::State, Extension};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::{AnalyzeOutcome, AnalyzeRequest};
use crate::services::DocumentService;
use crate::state::AppState;
use crate::validation::{ValidatedJson, ValidatedPath};

/// POST /api/documents/:id/analyze - Send the file to the analysis backend
///
/// Expected Input (optional fields):
/// ```json
/// { "analysisType": "tax" }
/// ```
///
/// On success the response carries the updated document and the new analysis.
/// On failure the document is left in `error` status and can be analysed again.
pub async fn analyze_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedPath(id): ValidatedPath<Uuid>,
    ValidatedJson(request): ValidatedJson<AnalyzeRequest>,
) -> ApiResult<AnalyzeOutcome> {
    let outcome = DocumentService::new(&state)
        .analyze(auth.user_id, id, request)
        .await?;
    Ok(ApiResponse::success(outcome).with_message("Document analysed"))
}
