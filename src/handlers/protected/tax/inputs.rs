// handlers/protected/tax/inputs.rs - /api/tax-inputs handlers

use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::database::models::TaxInput;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::tax_service::{FromDocumentRequest, TaxInputPatch, TaxInputRequest};
use crate::services::TaxService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// POST /api/tax-inputs - Create the active tax inputs
///
/// Expected Input:
/// ```json
/// { "annualIncome": 1200000, "section80C": 150000, "section80D": 25000, "overwrite": false }
/// ```
///
/// Deductions are clamped to their statutory limits. An existing active record
/// is a 409 unless `overwrite` is true.
pub async fn inputs_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<TaxInputRequest>,
) -> ApiResult<TaxInput> {
    let input = TaxService::new(&state).create(auth.user_id, request).await?;
    Ok(ApiResponse::created(input).with_message("Tax inputs saved"))
}

/// GET /api/tax-inputs - The active tax inputs
pub async fn inputs_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<TaxInput> {
    let input = TaxService::new(&state).get(auth.user_id).await?;
    Ok(ApiResponse::success(input))
}

/// PUT /api/tax-inputs - Merge a partial update into the active tax inputs
pub async fn inputs_put(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(patch): ValidatedJson<TaxInputPatch>,
) -> ApiResult<TaxInput> {
    let input = TaxService::new(&state).update(auth.user_id, patch).await?;
    Ok(ApiResponse::success(input).with_message("Tax inputs updated"))
}

/// DELETE /api/tax-inputs - Deactivate the active tax inputs
pub async fn inputs_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Value> {
    TaxService::new(&state).delete(auth.user_id).await?;
    Ok(ApiResponse::success(json!({ "deactivated": true })).with_message("Tax inputs deactivated"))
}

/// POST /api/tax-inputs/from-document - Populate tax inputs from a document analysis
///
/// Expected Input:
/// ```json
/// { "documentId": "7f0c...", "overwrite": true }
/// ```
pub async fn from_document_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<FromDocumentRequest>,
) -> ApiResult<TaxInput> {
    let input = TaxService::new(&state)
        .from_document(auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(input).with_message("Tax inputs populated from document"))
}
