// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Security Level: None
// Route Prefix: none (/, /health, /auth/*)

pub mod auth;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::root_get))
        .route("/health", get(health::health_get))
        .route("/auth/register", post(auth::register_post))
        .route("/auth/login", post(auth::login_post))
}
