// handlers/protected/dashboard.rs - /api/dashboard and /api/agents/health handlers

use axum::{extract::State, Extension};

use crate::database::models::{DashboardSnapshot, DashboardView};
use crate::database::{Page, Pagination};
use crate::gateway::GatewayHealth;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::dashboard_service::DashboardQuery;
use crate::services::DashboardService;
use crate::state::AppState;
use crate::validation::ValidatedQuery;

/// GET /api/dashboard - Active snapshot, or a live aggregation with `?refresh=true`
pub async fn dashboard_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<DashboardQuery>,
) -> ApiResult<DashboardView> {
    let view = DashboardService::new(&state).get(auth.user_id, query).await?;
    Ok(ApiResponse::success(view))
}

/// POST /api/dashboard/snapshots - Freeze the live aggregation as the active snapshot
pub async fn snapshot_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<DashboardSnapshot> {
    let snapshot = DashboardService::new(&state)
        .create_snapshot(auth.user_id)
        .await?;
    Ok(ApiResponse::created(snapshot).with_message("Dashboard snapshot created"))
}

/// GET /api/dashboard/snapshots - Snapshot history, newest first
pub async fn snapshots_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    ValidatedQuery(page): ValidatedQuery<Pagination>,
) -> ApiResult<Page<DashboardSnapshot>> {
    let snapshots = DashboardService::new(&state)
        .snapshots(auth.user_id, page)
        .await?;
    Ok(ApiResponse::success(snapshots))
}

/// GET /api/agents/health - Analysis backend health
pub async fn agents_health_get(State(state): State<AppState>) -> ApiResult<GatewayHealth> {
    let health = DashboardService::new(&state).agents_health().await?;
    Ok(ApiResponse::success(health))
}
