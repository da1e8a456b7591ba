//! Socket protocol. Frames are JSON objects tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{ChatEntry, MoveEntry};
use crate::side::{EndReason, Outcome, Role, Side};

// ---- Client → Server ----

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinGame {
        match_id: Uuid,
        /// Display label only; seats are keyed by connection.
        player_id: Option<String>,
        #[serde(default)]
        role: Role,
    },
    MoveMade {
        match_id: Uuid,
        #[serde(rename = "move")]
        mv: String,
        position: String,
        /// Checkmate or stalemate as judged by the mover's rules engine.
        #[serde(default)]
        is_terminal: bool,
        winner: Option<Outcome>,
        current_turn: Option<Side>,
    },
    ChatMessage {
        match_id: Uuid,
        user: String,
        text: String,
    },
    OfferDraw {
        match_id: Uuid,
        offering_side: Option<Side>,
    },
    RespondToDraw {
        match_id: Uuid,
        accepted: bool,
    },
    RequestUndo {
        match_id: Uuid,
        requesting_side: Option<Side>,
    },
    RespondToUndo {
        match_id: Uuid,
        accepted: bool,
        state: Option<UndoState>,
    },
    Surrender {
        match_id: Uuid,
        losing_side: Option<Side>,
    },
    DrawGame {
        match_id: Uuid,
    },
    TimeUp {
        match_id: Uuid,
        losing_side: Side,
    },
}

impl ClientEvent {
    pub fn match_id(&self) -> Uuid {
        match self {
            ClientEvent::JoinGame { match_id, .. }
            | ClientEvent::MoveMade { match_id, .. }
            | ClientEvent::ChatMessage { match_id, .. }
            | ClientEvent::OfferDraw { match_id, .. }
            | ClientEvent::RespondToDraw { match_id, .. }
            | ClientEvent::RequestUndo { match_id, .. }
            | ClientEvent::RespondToUndo { match_id, .. }
            | ClientEvent::Surrender { match_id, .. }
            | ClientEvent::DrawGame { match_id }
            | ClientEvent::TimeUp { match_id, .. } => *match_id,
        }
    }
}

/// Position the requester rebuilt locally after taking back a move.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UndoState {
    pub position: String,
    pub turn: Side,
    pub last_move: Option<String>,
}

// ---- Server → Client ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    AssignedRole {
        role: Role,
    },
    AssignedSide {
        side: Side,
    },
    Occupancy {
        player_count: usize,
        onlooker_count: usize,
    },
    MoveHistorySnapshot {
        entries: Vec<MoveEntry>,
        outcome: Option<Outcome>,
    },
    ChatHistorySnapshot {
        entries: Vec<ChatEntry>,
    },
    OpponentMove {
        #[serde(rename = "move")]
        mv: String,
        position: String,
    },
    ClockUpdate {
        white_seconds: u32,
        black_seconds: u32,
        current_turn: Side,
    },
    MatchEnded {
        outcome: Outcome,
        reason: EndReason,
    },
    ChatMessage {
        user: String,
        text: String,
        sent_at: DateTime<Utc>,
    },
    DrawOffered {
        offering_side: Side,
    },
    DrawDeclined,
    UndoRequested {
        requesting_side: Side,
    },
    UndoDeclined,
    UndoApplied {
        position: String,
        turn: Side,
        removed_move: Option<String>,
    },
    UndoFailed {
        reason: String,
    },
    RoomFull,
    Error {
        message: String,
    },
}
