// handlers/public/health.rs - GET / and GET /health

use axum::extract::State;
use serde_json::{json, Value};

use crate::database::repository::Store;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET / - Service description
pub async fn root_get() -> ApiResponse<Value> {
    ApiResponse::success(json!({
        "name": "TaxWise API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Personal finance backend: onboarding, documents, tax inputs, CIBIL analyses and dashboards",
        "endpoints": {
            "public": ["/", "/health", "/auth/register", "/auth/login"],
            "protected": [
                "/api/user/profile",
                "/api/onboarding",
                "/api/documents",
                "/api/tax-inputs",
                "/api/tax",
                "/api/cibil",
                "/api/dashboard",
                "/api/agents/health",
                "/api/chat"
            ]
        }
    }))
}

/// GET /health - Store connectivity; 503 when the store cannot be reached
pub async fn health_get(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = state.store.health_check().await {
        tracing::error!(error = %e, "Store health check failed");
        return Err(ApiError::service_unavailable("Database is unreachable"));
    }
    Ok(ApiResponse::success(json!({
        "status": "ok",
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now(),
    })))
}
