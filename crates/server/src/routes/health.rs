use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};

use crate::coordinator::Coordinator;

/// GET /health
pub async fn health_check(Extension(coordinator): Extension<Coordinator>) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "liveRooms": coordinator.live_rooms(),
    }))
}
