//! Live match coordinator.
//!
//! Owns every in-memory room. Each connection's reader loop feeds typed
//! `ClientEvent`s through [`Coordinator::handle`]; outbound `ServerEvent`s go
//! out through the per-connection channel returned by [`Coordinator::connect`].
//!
//! Locking: the room map and membership index are `DashMap`s whose guards are
//! never held across an await. Each room sits behind its own async mutex, held
//! for the whole of a handler including its store writes, so events and clock
//! ticks for one room are applied one at a time and in order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use match_core::{ClientEvent, ConnectionId, Outcome, ServerEvent, Side};

use crate::config::Config;
use crate::store::{MatchStore, StoreError};

mod bus;
mod countdown;
mod negotiation;
mod registry;
mod relay;
mod room;

use bus::Bus;
use relay::ReportedMove;
use room::MatchRoom;

type RoomHandle = Arc<Mutex<MatchRoom>>;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    /// Countdown period; one second is charged per tick.
    pub tick: Duration,
    /// Ticks between clock checkpoints written to the store.
    pub persist_every: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            persist_every: 10,
        }
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            tick: config.clock_tick(),
            persist_every: config.clock_persist_every,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Room is full")]
    RoomFull,

    #[error("{0}")]
    UndoFailed(String),

    #[error("Match not found")]
    MatchNotFound,

    #[error("Not joined to this match")]
    NotJoined,

    #[error("Only seated players can do that")]
    NotAPlayer,

    #[error("It is not your turn")]
    NotYourTurn,

    #[error("Match is already over")]
    MatchOver,

    #[error("Nothing to respond to")]
    NoPendingOffer,

    #[error("Opponent is not connected")]
    OpponentAbsent,

    #[error("Match is not timed")]
    Untimed,

    #[error("Match storage is unavailable, try again")]
    Store(#[from] StoreError),
}

impl CoordinatorError {
    /// Notice sent back to the connection whose event failed.
    pub fn to_event(&self) -> ServerEvent {
        match self {
            CoordinatorError::RoomFull => ServerEvent::RoomFull,
            CoordinatorError::UndoFailed(reason) => ServerEvent::UndoFailed {
                reason: reason.clone(),
            },
            other => ServerEvent::Error {
                message: other.to_string(),
            },
        }
    }
}

/// Live view of one room, for the lobby and status lookups.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatus {
    pub player_count: usize,
    pub onlooker_count: usize,
    pub has_white: bool,
    pub has_black: bool,
    pub current_turn: Side,
    pub moves_played: usize,
    pub white_seconds: Option<u32>,
    pub black_seconds: Option<u32>,
    pub clock_running: bool,
    pub outcome: Option<Outcome>,
}

#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn MatchStore>,
    rooms: DashMap<Uuid, RoomHandle>,
    membership: DashMap<ConnectionId, Uuid>,
    /// Outcomes decided in a room whose store write failed. Applied to any
    /// rebuilt room until the write lands.
    unsettled: DashMap<Uuid, Outcome>,
    bus: Bus,
    next_conn: AtomicU64,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(store: Arc<dyn MatchStore>, settings: CoordinatorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                rooms: DashMap::new(),
                membership: DashMap::new(),
                unsettled: DashMap::new(),
                bus: Bus::default(),
                next_conn: AtomicU64::new(1),
                settings,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn MatchStore> {
        &self.inner.store
    }

    /// Register a new connection and hand back its outbound event stream.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn = ConnectionId(self.inner.next_conn.fetch_add(1, Ordering::Relaxed));
        let rx = self.inner.bus.register(conn);
        tracing::debug!(%conn, "connection registered");
        (conn, rx)
    }

    /// Apply one inbound event. Failures are reported to `conn` only.
    pub async fn handle(&self, conn: ConnectionId, event: ClientEvent) {
        let match_id = event.match_id();
        let result = match event {
            ClientEvent::JoinGame { player_id, role, .. } => {
                self.join(conn, match_id, player_id, role).await
            }
            ClientEvent::MoveMade {
                mv,
                position,
                is_terminal,
                winner,
                current_turn,
                ..
            } => {
                let reported = ReportedMove {
                    mv,
                    position,
                    is_terminal,
                    winner,
                    claimed_next_turn: current_turn,
                };
                self.make_move(conn, match_id, reported).await
            }
            ClientEvent::ChatMessage { user, text, .. } => {
                self.chat(conn, match_id, user, text).await
            }
            ClientEvent::OfferDraw { offering_side, .. } => {
                self.offer_draw(conn, match_id, offering_side).await
            }
            ClientEvent::RespondToDraw { accepted, .. } => {
                self.respond_to_draw(conn, match_id, accepted).await
            }
            ClientEvent::RequestUndo { requesting_side, .. } => {
                self.request_undo(conn, match_id, requesting_side).await
            }
            ClientEvent::RespondToUndo { accepted, state, .. } => {
                self.respond_to_undo(conn, match_id, accepted, state).await
            }
            ClientEvent::Surrender { losing_side, .. } => {
                self.surrender(conn, match_id, losing_side).await
            }
            ClientEvent::DrawGame { .. } => self.draw_game(conn, match_id).await,
            ClientEvent::TimeUp { losing_side, .. } => {
                self.time_up(conn, match_id, losing_side).await
            }
        };

        if let Err(e) = result {
            match &e {
                CoordinatorError::Store(source) => {
                    tracing::warn!(%conn, %match_id, "store error: {source}")
                }
                other => tracing::debug!(%conn, %match_id, "rejected: {other}"),
            }
            self.inner.bus.send(conn, e.to_event());
        }
    }

    /// Send a notice to one connection outside of any room event.
    pub fn notify(&self, conn: ConnectionId, event: ServerEvent) {
        self.inner.bus.send(conn, event);
    }

    /// Drop every trace of `conn`: its seat or onlooker slot and its outbox.
    pub async fn disconnect(&self, conn: ConnectionId) {
        if let Some((_, match_id)) = self.inner.membership.remove(&conn) {
            self.leave(conn, match_id).await;
        }
        self.inner.bus.unregister(conn);
        tracing::debug!(%conn, "connection closed");
    }

    /// Live state of a room, or `None` if nobody is connected to the match.
    pub async fn room_status(&self, match_id: Uuid) -> Option<RoomStatus> {
        let handle = self.inner.rooms.get(&match_id).map(|h| h.value().clone())?;
        let room = handle.lock().await;
        if room.closed {
            return None;
        }
        Some(room.status())
    }

    /// Outcome decided here but not yet written to the store.
    pub fn unsettled_outcome(&self, match_id: Uuid) -> Option<Outcome> {
        self.inner.unsettled.get(&match_id).map(|o| *o.value())
    }

    pub fn live_rooms(&self) -> usize {
        self.inner.rooms.len()
    }
}
