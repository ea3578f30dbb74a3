//! Contains all the routes that this application can handle.

mod api;

use crate::AppState;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};

async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// All the routes of the server
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api", get(api::root))
        .route("/api/", get(api::root))
        .nest("/api", api_routes(app_state))
        .route("/health-check", get(health_check))
}

/// API - Routes nested under "/api" path
fn api_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/signup", post(api::signup))
        .route("/status", get(api::status_list).post(api::status_create))
        .with_state(app_state)
}
