pub mod error;
pub mod pipeline;

pub use error::{ApiError, ApiResult};

use axum::{routing::{get, post}, Router};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the router for the pipeline entry points
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Pipeline routes
        .route("/feeds/setup", post(pipeline::setup))
        .route("/feeds/reset", post(pipeline::reset))
        .route("/feeds/reset-and-seed", post(pipeline::reset_and_seed))
        .route("/feeds/seed", post(pipeline::seed))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
