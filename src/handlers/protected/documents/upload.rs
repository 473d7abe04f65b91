// handlers/protected/documents/upload.rs - POST /api/documents/upload handler

use axum::{extract::State, Extension};

use crate::database::models::FinancialDocument;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::document_service::UploadRequest;
use crate::services::DocumentService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// POST /api/documents/upload - Store a batch of base64-encoded files
///
/// Expected Input:
/// ```json
/// {
///   "files": [
///     { "fileName": "form16.pdf", "fileType": "application/pdf", "fileSize": 48213, "content": "JVBERi0x..." }
///   ]
/// }
/// ```
///
/// The whole batch is rejected if any file fails its type or size checks.
pub async fn upload_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<UploadRequest>,
) -> ApiResult<Vec<FinancialDocument>> {
    let documents = DocumentService::new(&state)
        .upload(auth.user_id, request)
        .await?;
    let message = format!("{} document(s) uploaded", documents.len());
    Ok(ApiResponse::created(documents).with_message(message))
}
