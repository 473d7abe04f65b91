// handlers/protected/tax/calculate.rs - /api/tax/calculate, /api/tax/optimize and /api/tax/query handlers

use axum::{extract::State, Extension};

use crate::gateway::{TaxQueryAnswer, TaxStrategy};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::tax_service::{OptimizeRequest, TaxCalculationOutcome, TaxQuestion};
use crate::services::TaxService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// POST /api/tax/calculate - Compare regimes for the active tax inputs
///
/// The result is also stored on the tax inputs as `lastCalculation`.
pub async fn calculate_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<TaxCalculationOutcome> {
    let outcome = TaxService::new(&state).calculate(auth.user_id).await?;
    Ok(ApiResponse::success(outcome))
}

/// POST /api/tax/optimize - Investment strategy for the active tax inputs
///
/// Expected Input:
/// ```json
/// { "age": 32, "riskAppetite": "moderate", "familySize": 3, "cityTier": "metro" }
/// ```
pub async fn optimize_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<OptimizeRequest>,
) -> ApiResult<TaxStrategy> {
    let strategy = TaxService::new(&state)
        .optimize(auth.user_id, request)
        .await?;
    Ok(ApiResponse::success(strategy))
}

/// POST /api/tax/query - Quick tax question
///
/// Expected Input:
/// ```json
/// { "question": "Can I claim both HRA and home loan interest?", "incomeDetails": { "annual_income": 1400000 } }
/// ```
pub async fn query_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(question): ValidatedJson<TaxQuestion>,
) -> ApiResult<TaxQueryAnswer> {
    let answer = TaxService::new(&state).query(auth.user_id, question).await?;
    Ok(ApiResponse::success(answer))
}
