//! Move relay, ledger writes and chat.

use chrono::Utc;
use uuid::Uuid;

use match_core::{ChatEntry, ConnectionId, EndReason, MoveEntry, Outcome, ServerEvent, Side};

use super::{Coordinator, CoordinatorError};

/// A move as reported by the mover's client. Legality and terminality are
/// the client's rules engine's word and are recorded, not checked.
#[derive(Debug, Clone)]
pub(super) struct ReportedMove {
    pub mv: String,
    pub position: String,
    pub is_terminal: bool,
    pub winner: Option<Outcome>,
    pub claimed_next_turn: Option<Side>,
}

impl Coordinator {
    pub(super) async fn make_move(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        reported: ReportedMove,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        let side = room.player_side(conn)?;
        room.ensure_in_progress()?;
        if side != room.current_turn {
            return Err(CoordinatorError::NotYourTurn);
        }

        if room.moves.is_empty() {
            tracing::info!(%match_id, "match has begun");
        }
        let started = room.clock.as_mut().is_some_and(|clock| clock.start());
        if started {
            tracing::info!(%match_id, "clock started");
            self.start_countdown(&handle, &mut room);
        }

        room.moves.push(MoveEntry {
            mv: reported.mv.clone(),
            position: reported.position.clone(),
        });
        room.current_turn = side.opponent();
        room.pending_draw = None;
        room.pending_undo = None;

        if let Some(claimed) = reported.claimed_next_turn {
            if claimed != room.current_turn {
                tracing::warn!(%match_id, %claimed, actual = %room.current_turn, "client disagrees on turn");
            }
        }
        tracing::debug!(%match_id, %side, mv = %reported.mv, ply = room.moves.len(), "move");

        let snapshot = room.clock_snapshot();
        if let Err(e) = self
            .inner
            .store
            .save_moves(match_id, &room.moves, &snapshot)
            .await
        {
            tracing::warn!(%match_id, "failed to persist move: {e}");
        }

        self.broadcast_clock(&room);

        match (reported.is_terminal, reported.winner) {
            (true, Some(outcome)) => {
                self.conclude(&handle, &mut room, outcome, EndReason::Checkmate)
                    .await
            }
            (terminal, _) => {
                if terminal {
                    tracing::warn!(%match_id, "terminal move reported without a winner");
                }
                let event = ServerEvent::OpponentMove {
                    mv: reported.mv,
                    position: reported.position,
                };
                self.inner
                    .bus
                    .broadcast_except(room.seats.members(), conn, &event);
                Ok(())
            }
        }
    }

    pub(super) async fn chat(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        user: String,
        text: String,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let room = handle.lock().await;
        if room.closed || !room.seats.is_member(conn) {
            return Err(CoordinatorError::NotJoined);
        }
        if text.trim().is_empty() {
            return Ok(());
        }

        let entry = ChatEntry {
            sender: user,
            text,
            sent_at: Utc::now(),
        };
        if let Err(e) = self.inner.store.append_chat(match_id, &entry).await {
            tracing::warn!(%match_id, "failed to persist chat message: {e}");
        }

        let event = ServerEvent::ChatMessage {
            user: entry.sender,
            text: entry.text,
            sent_at: entry.sent_at,
        };
        self.inner.bus.broadcast(room.seats.members(), &event);
        Ok(())
    }
}
