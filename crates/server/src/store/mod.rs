//! Persistence gateway: durable match records, move ledger and chat log.
//! No business rules live here.

use async_trait::async_trait;
use uuid::Uuid;

use match_core::{ChatEntry, ClockSnapshot, MatchRecord, MoveEntry, Outcome};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Match not found: {0}")]
    NotFound(Uuid),

    #[error("Corrupt match row {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError>;

    async fn fetch_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError>;

    /// Public matches still in progress, newest first.
    async fn list_open_matches(&self) -> Result<Vec<MatchRecord>, StoreError>;

    /// Overwrite the move ledger and the clock fields in one write.
    async fn save_moves(
        &self,
        match_id: Uuid,
        moves: &[MoveEntry],
        clock: &ClockSnapshot,
    ) -> Result<(), StoreError>;

    async fn save_clock(&self, match_id: Uuid, clock: &ClockSnapshot) -> Result<(), StoreError>;

    /// Set the outcome if none is recorded yet. Returns whether this call set it.
    async fn record_outcome(&self, match_id: Uuid, outcome: Outcome) -> Result<bool, StoreError>;

    async fn append_chat(&self, match_id: Uuid, entry: &ChatEntry) -> Result<(), StoreError>;

    async fn chat_history(&self, match_id: Uuid) -> Result<Vec<ChatEntry>, StoreError>;
}
