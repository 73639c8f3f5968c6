//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing, request timeout.

use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Slack on top of the slowest engine branch before a request is cut off.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let slowest_branch = state
        .config
        .adapters
        .iter()
        .map(|a| a.timeout(state.config.adapter_timeout()))
        .chain([state.config.adapter_timeout(), state.config.vision_timeout()])
        .max()
        .unwrap_or_default();
    // A re-triggered guidance turn classifies before research starts.
    let request_timeout = slowest_branch * 2 + REQUEST_TIMEOUT_SLACK;

    let api_routes = Router::new()
        .route(
            "/sessions/{id}",
            post(handlers::session::create_session)
                .get(handlers::session::get_session)
                .delete(handlers::session::delete_session),
        )
        .route(
            "/sessions/{id}/messages",
            post(handlers::session::post_message),
        )
        .route(
            "/sessions/{id}/history",
            get(handlers::session::get_history),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness plus a summary of the engine configuration.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": state.manager.store().name(),
        "adapters": state.config.enabled_adapters().count(),
        "vision": state.config.vision.endpoint.is_some(),
    }))
}
