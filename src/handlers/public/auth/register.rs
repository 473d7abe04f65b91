// handlers/public/auth/register.rs - POST /auth/register handler

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthSession, RegisterRequest};
use crate::services::AuthService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// POST /auth/register - Create an account and sign it in
///
/// Expected Input:
/// ```json
/// { "email": "asha@example.com", "password": "at-least-8", "name": "Asha", "phone": "9876543210" }
/// ```
///
/// Returns 201 with `{ token, expiresIn, user }`; an email already in use is a 409.
pub async fn register_post(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(&state).register(request).await?;
    Ok(ApiResponse::created(session).with_message("Account created"))
}
