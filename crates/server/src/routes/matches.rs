use axum::{extract::Path, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use match_core::{NewMatch, TimeControl};

use crate::coordinator::Coordinator;
use crate::error::AppError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyEntry {
    pub game_id: Uuid,
    pub time_control: TimeControl,
    pub time_limit: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub player_count: usize,
    pub onlooker_count: usize,
    pub available_slots: usize,
    pub can_join: bool,
    pub has_white: bool,
    pub has_black: bool,
}

/// POST /api/matches
pub async fn create_match(
    Extension(coordinator): Extension<Coordinator>,
    Json(req): Json<NewMatch>,
) -> Result<Json<JsonValue>, AppError> {
    req.validate().map_err(AppError::BadRequest)?;

    let record = req.into_record(Uuid::new_v4(), Utc::now());
    coordinator.store().create_match(&record).await?;
    tracing::info!(
        match_id = %record.id,
        time_control = record.time_control.as_str(),
        time_limit = ?record.time_limit,
        "match created"
    );

    Ok(Json(json!({
        "success": true,
        "game_id": record.id,
    })))
}

/// GET /api/matches/public
pub async fn list_public_matches(
    Extension(coordinator): Extension<Coordinator>,
) -> Result<Json<Vec<LobbyEntry>>, AppError> {
    let records = coordinator.store().list_open_matches().await?;

    let mut entries = Vec::with_capacity(records.len());
    for record in records.into_iter().filter(|r| coordinator.unsettled_outcome(r.id).is_none()) {
        let live = coordinator.room_status(record.id).await;
        let player_count = live.as_ref().map_or(0, |s| s.player_count);
        entries.push(LobbyEntry {
            game_id: record.id,
            time_control: record.time_control,
            time_limit: record.time_limit,
            created_at: record.created_at,
            player_count,
            onlooker_count: live.as_ref().map_or(0, |s| s.onlooker_count),
            available_slots: 2usize.saturating_sub(player_count),
            can_join: player_count < 2,
            has_white: live.as_ref().is_some_and(|s| s.has_white),
            has_black: live.as_ref().is_some_and(|s| s.has_black),
        });
    }

    Ok(Json(entries))
}

/// GET /api/matches/{match_id}/status
pub async fn match_status(
    Extension(coordinator): Extension<Coordinator>,
    Path(match_id): Path<Uuid>,
) -> Result<Json<JsonValue>, AppError> {
    let store = coordinator.store();
    let mut record = store
        .fetch_match(match_id)
        .await?
        .ok_or(AppError::NotFound("Match not found".into()))?;
    if record.outcome.is_none() {
        record.outcome = coordinator.unsettled_outcome(match_id);
    }
    let chat = store.chat_history(match_id).await?;
    let live = coordinator.room_status(match_id).await;

    Ok(Json(json!({
        "match": record,
        "chat": chat,
        "live": live,
    })))
}
