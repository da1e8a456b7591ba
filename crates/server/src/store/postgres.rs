use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use match_core::{ChatEntry, ClockSnapshot, MatchRecord, MoveEntry, Outcome};

use super::{MatchStore, StoreError};
use crate::db::{chat, matches};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        matches::insert_match(&self.pool, record).await
    }

    async fn fetch_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        matches::fetch_match(&self.pool, match_id).await
    }

    async fn list_open_matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        matches::list_open(&self.pool).await
    }

    async fn save_moves(
        &self,
        match_id: Uuid,
        moves: &[MoveEntry],
        clock: &ClockSnapshot,
    ) -> Result<(), StoreError> {
        matches::save_moves(&self.pool, match_id, moves, clock).await
    }

    async fn save_clock(&self, match_id: Uuid, clock: &ClockSnapshot) -> Result<(), StoreError> {
        matches::save_clock(&self.pool, match_id, clock).await
    }

    async fn record_outcome(&self, match_id: Uuid, outcome: Outcome) -> Result<bool, StoreError> {
        matches::record_outcome(&self.pool, match_id, outcome).await
    }

    async fn append_chat(&self, match_id: Uuid, entry: &ChatEntry) -> Result<(), StoreError> {
        chat::insert_message(&self.pool, match_id, entry).await
    }

    async fn chat_history(&self, match_id: Uuid) -> Result<Vec<ChatEntry>, StoreError> {
        chat::list_messages(&self.pool, match_id).await
    }
}
