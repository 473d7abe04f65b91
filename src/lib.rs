pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;
pub mod types;
pub mod validation;

use axum::{extract::DefaultBodyLimit, http::HeaderValue, middleware::from_fn_with_state, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Full router: public routes, `/api` behind bearer auth, global layers.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.uploads.max_request_size_bytes();

    let protected = handlers::protected::router()
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    Router::new()
        .merge(handlers::public::router())
        .nest("/api", protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    if state.config.is_development() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = state
        .config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
