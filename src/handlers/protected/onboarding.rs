// handlers/protected/onboarding.rs - /api/onboarding handlers

use axum::{extract::State, Extension};

use crate::database::models::OnboardingData;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::onboarding_service::StepSubmission;
use crate::services::OnboardingService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// GET /api/onboarding - Wizard state, or a not-started view for new users
pub async fn onboarding_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<OnboardingData> {
    let data = OnboardingService::new(&state).get(auth.user_id).await?;
    Ok(ApiResponse::success(data))
}

/// POST /api/onboarding/step - Submit one wizard step
///
/// Expected Input:
/// ```json
/// { "step": "financialInfo", "data": { "annualIncome": 1200000, "employmentType": "salaried" } }
/// ```
///
/// Steps are linear: only the current step or an already completed one may be submitted.
pub async fn step_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(submission): ValidatedJson<StepSubmission>,
) -> ApiResult<OnboardingData> {
    let data = OnboardingService::new(&state)
        .submit_step(auth.user_id, submission)
        .await?;
    Ok(ApiResponse::success(data).with_message("Onboarding step saved"))
}
