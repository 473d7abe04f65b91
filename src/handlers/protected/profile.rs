// handlers/protected/profile.rs - /api/user/profile handlers

use axum::{extract::State, Extension};

use crate::database::models::User;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::auth_service::ProfileUpdateRequest;
use crate::services::AuthService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// GET /api/user/profile - The authenticated user's account
pub async fn profile_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<User> {
    let user = AuthService::new(&state).profile(auth.user_id).await?;
    Ok(ApiResponse::success(user))
}

/// PUT /api/user/profile - Update name, phone or profile photo
pub async fn profile_put(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<ProfileUpdateRequest>,
) -> ApiResult<User> {
    let user = AuthService::new(&state)
        .update_profile(auth.user_id, request)
        .await?;
    Ok(ApiResponse::success(user).with_message("Profile updated"))
}
