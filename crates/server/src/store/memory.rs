//! In-process store. Used when no database is configured, and by tests.
//! Matches do not survive a restart.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use match_core::{ChatEntry, ClockSnapshot, MatchRecord, MoveEntry, Outcome};

use super::{MatchStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    matches: DashMap<Uuid, MatchRecord>,
    chat: DashMap<Uuid, Vec<ChatEntry>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Current durable copy of a match, bypassing the offline switch.
    pub fn snapshot(&self, match_id: Uuid) -> Option<MatchRecord> {
        self.matches.get(&match_id).map(|r| r.value().clone())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn update<T>(
        &self,
        match_id: Uuid,
        f: impl FnOnce(&mut MatchRecord) -> T,
    ) -> Result<T, StoreError> {
        self.check()?;
        let mut record = self
            .matches
            .get_mut(&match_id)
            .ok_or(StoreError::NotFound(match_id))?;
        Ok(f(record.value_mut()))
    }
}

fn apply_clock(record: &mut MatchRecord, clock: &ClockSnapshot) {
    if let Some(white) = clock.white_seconds {
        record.white_seconds = Some(white);
    }
    if let Some(black) = clock.black_seconds {
        record.black_seconds = Some(black);
    }
    record.current_turn = clock.current_turn;
    record.clock_started |= clock.clock_started;
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), StoreError> {
        self.check()?;
        self.matches.insert(record.id, record.clone());
        Ok(())
    }

    async fn fetch_match(&self, match_id: Uuid) -> Result<Option<MatchRecord>, StoreError> {
        self.check()?;
        Ok(self.snapshot(match_id))
    }

    async fn list_open_matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        self.check()?;
        let mut open: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|r| !r.is_private && r.outcome.is_none())
            .map(|r| r.value().clone())
            .collect();
        open.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(open)
    }

    async fn save_moves(
        &self,
        match_id: Uuid,
        moves: &[MoveEntry],
        clock: &ClockSnapshot,
    ) -> Result<(), StoreError> {
        self.update(match_id, |record| {
            record.move_history = moves.to_vec();
            apply_clock(record, clock);
        })
    }

    async fn save_clock(&self, match_id: Uuid, clock: &ClockSnapshot) -> Result<(), StoreError> {
        self.update(match_id, |record| apply_clock(record, clock))
    }

    async fn record_outcome(&self, match_id: Uuid, outcome: Outcome) -> Result<bool, StoreError> {
        self.update(match_id, |record| {
            if record.outcome.is_some() {
                return false;
            }
            record.outcome = Some(outcome);
            true
        })
    }

    async fn append_chat(&self, match_id: Uuid, entry: &ChatEntry) -> Result<(), StoreError> {
        self.check()?;
        if !self.matches.contains_key(&match_id) {
            return Err(StoreError::NotFound(match_id));
        }
        self.chat.entry(match_id).or_default().push(entry.clone());
        Ok(())
    }

    async fn chat_history(&self, match_id: Uuid) -> Result<Vec<ChatEntry>, StoreError> {
        self.check()?;
        Ok(self.chat.get(&match_id).map(|c| c.value().clone()).unwrap_or_default())
    }
}
