use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all Canopy endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/posts", post(handler::create_post_handler))
        .route("/v1/posts/:id", get(handler::get_post_handler))
        .route("/v1/posts/:id/comments", post(handler::add_comment_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
