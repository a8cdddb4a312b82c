//! HTTP surface: routes, admission (rate limiting, validation), and
//! uniform error handling. The admission layer is the only thing that
//! ever rejects a request before it reaches the orchestrator.

pub mod handlers;
pub mod stream;
pub mod validation;

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/research", post(handlers::start_research))
        .route("/research/:id", get(handlers::get_research))
        .route("/research/:id/stream", get(handlers::stream_research))
        .route("/history", get(handlers::list_history))
        .route("/history/:id", delete(handlers::delete_history))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
