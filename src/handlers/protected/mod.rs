// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Security Level: bearer token, checked by `jwt_auth_middleware` before any handler runs
// Route Prefix: /api
// Handler context: `State<AppState>` plus `Extension<AuthUser>` for the caller

pub mod chat;
pub mod cibil;
pub mod dashboard;
pub mod documents;
pub mod onboarding;
pub mod profile;
pub mod tax;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Routes relative to `/api`. The caller layers authentication on top.
pub fn router() -> Router<AppState> {
    Router::new()
        // Account
        .route("/user/profile", get(profile::profile_get).put(profile::profile_put))
        // Onboarding wizard
        .route("/onboarding", get(onboarding::onboarding_get))
        .route("/onboarding/step", post(onboarding::step_post))
        // Documents
        .route("/documents", get(documents::list_get))
        .route("/documents/upload", post(documents::upload_post))
        .route(
            "/documents/:id",
            get(documents::document_get).delete(documents::document_delete),
        )
        .route("/documents/:id/analyses", get(documents::analyses_get))
        .route("/documents/:id/analyze", post(documents::analyze_post))
        // Tax
        .route(
            "/tax-inputs",
            get(tax::inputs_get)
                .post(tax::inputs_post)
                .put(tax::inputs_put)
                .delete(tax::inputs_delete),
        )
        .route("/tax-inputs/from-document", post(tax::from_document_post))
        .route("/tax/calculate", post(tax::calculate_post))
        .route("/tax/optimize", post(tax::optimize_post))
        .route("/tax/query", post(tax::query_post))
        // CIBIL
        .route("/cibil/analyze", post(cibil::analyze_post))
        .route("/cibil/analyses", get(cibil::analyses_get))
        .route("/cibil/analyses/latest", get(cibil::latest_get))
        .route("/cibil/scenarios", post(cibil::scenarios_post))
        .route("/cibil/report", post(cibil::report_post))
        // Dashboard
        .route("/dashboard", get(dashboard::dashboard_get))
        .route(
            "/dashboard/snapshots",
            get(dashboard::snapshots_get).post(dashboard::snapshot_post),
        )
        .route("/agents/health", get(dashboard::agents_health_get))
        // Chat assistant
        .route("/chat", post(chat::chat_post))
        .route(
            "/chat/history",
            get(chat::history_get).delete(chat::history_delete),
        )
        .route("/chat/insights", post(chat::insights_post))
}
