// handlers/public/auth/login.rs - POST /auth/login handler

use axum::extract::State;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::{AuthSession, LoginRequest};
use crate::services::AuthService;
use crate::state::AppState;
use crate::validation::ValidatedJson;

/// POST /auth/login - Exchange email and password for a bearer token
///
/// Expected Input:
/// ```json
/// { "email": "asha@example.com", "password": "s3cret-pass" }
/// ```
///
/// Unknown emails and wrong passwords produce the same 401 so the endpoint
/// does not reveal which accounts exist.
pub async fn login_post(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<AuthSession> {
    let session = AuthService::new(&state).login(request).await?;
    Ok(ApiResponse::success(session))
}
