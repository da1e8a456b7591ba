use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::coordinator::Coordinator;

pub mod health;
pub mod match_ws;
pub mod matches;

pub fn app(coordinator: Coordinator) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Live play
        .route("/ws", get(match_ws::ws_handler))
        // Matches: specific routes before parameterized
        .route("/api/matches", post(matches::create_match))
        .route("/api/matches/public", get(matches::list_public_matches))
        .route("/api/matches/{match_id}/status", get(matches::match_status))
        // Shared state
        .layer(Extension(coordinator))
        .layer(cors)
}
