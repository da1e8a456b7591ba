use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use match_core::ChatEntry;

use crate::store::StoreError;

pub async fn insert_message(
    pool: &PgPool,
    match_id: Uuid,
    entry: &ChatEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO chat_messages (game_id, sender, message, created_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(match_id)
    .bind(&entry.sender)
    .bind(&entry.text)
    .bind(entry.sent_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Full transcript in send order.
pub async fn list_messages(pool: &PgPool, match_id: Uuid) -> Result<Vec<ChatEntry>, StoreError> {
    let rows: Vec<(String, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT sender, message, created_at FROM chat_messages WHERE game_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(match_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(sender, text, sent_at)| ChatEntry { sender, text, sent_at })
        .collect())
}
