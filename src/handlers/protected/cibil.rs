// handlers/protected/cibil.rs - /api/cibil handlers

use axum::{extract::State, Extension};
use serde_json::Value;

use crate::database::models::CibilAnalysis;
use crate::database::{Page, Pagination};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::gateway::CibilReport;
use crate::services::cibil_service::{CibilRequest, ReportRequest, ScenariosRequest};
use crate::services::CibilService;
use crate::state::AppState;
use crate::validation::{ValidatedJson, ValidatedQuery};

/// POST /api/cibil/analyze - Analyse a credit profile and keep the result
///
/// Expected Input (every field optional):
/// ```json
/// { "currentScore": 742, "paymentHistory": "good", "creditCards": 2, "currentUtilization": 35 }
/// ```
pub async fn analyze_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<CibilRequest>,
) -> ApiResult<CibilAnalysis> {
    let analysis = CibilService::new(&state)
        .analyze(auth.user_id, request)
        .await?;
    Ok(ApiResponse::created(analysis).with_message("CIBIL analysis completed"))
}

/// GET /api/cibil/analyses - Previous analyses, newest first
pub async fn analyses_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(page): ValidatedQuery<Pagination>,
) -> ApiResult<Page<CibilAnalysis>> {
    let analyses = CibilService::new(&state).list(auth.user_id, page).await?;
    Ok(ApiResponse::success(analyses))
}

/// GET /api/cibil/analyses/latest - Most recent analysis
pub async fn latest_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<CibilAnalysis> {
    let analysis = CibilService::new(&state).latest(auth.user_id).await?;
    Ok(ApiResponse::success(analysis))
}

/// POST /api/cibil/scenarios - What-if score projections
pub async fn scenarios_post(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ScenariosRequest>,
) -> ApiResult<Value> {
    let projections = CibilService::new(&state).scenarios(request).await?;
    Ok(ApiResponse::success(projections))
}

/// POST /api/cibil/report - 90-day improvement plan
///
/// Expected Input:
/// ```json
/// { "age": 29, "income": 720000, "currentScore": 690, "goals": "Home loan in 2 years" }
/// ```
pub async fn report_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<ReportRequest>,
) -> ApiResult<CibilReport> {
    let report = CibilService::new(&state).report(auth.user_id, request).await?;
    Ok(ApiResponse::success(report))
}
