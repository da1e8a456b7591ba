//! Draw and undo handshakes, single-sided endings, and the terminal path
//! every ending goes through.

use uuid::Uuid;

use match_core::{ConnectionId, EndReason, Outcome, ServerEvent, Side, UndoState};

use super::room::MatchRoom;
use super::{Coordinator, CoordinatorError, RoomHandle};

/// Seat wins over whatever side the client claims to be.
fn reconcile_claim(match_id: Uuid, seat: Side, claimed: Option<Side>) -> Side {
    if let Some(claimed) = claimed.filter(|claimed| *claimed != seat) {
        tracing::warn!(%match_id, %seat, %claimed, "claimed side does not match seat");
    }
    seat
}

impl Coordinator {
    pub(super) async fn offer_draw(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        claimed: Option<Side>,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        let side = reconcile_claim(match_id, room.player_side(conn)?, claimed);
        room.ensure_in_progress()?;
        let opponent = room
            .seats
            .holder(side.opponent())
            .ok_or(CoordinatorError::OpponentAbsent)?;

        room.pending_draw = Some(side);
        tracing::info!(%match_id, %side, "draw offered");
        self.inner
            .bus
            .send(opponent, ServerEvent::DrawOffered { offering_side: side });
        Ok(())
    }

    pub(super) async fn respond_to_draw(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        accepted: bool,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        let side = room.player_side(conn)?;
        room.ensure_in_progress()?;
        let offered_by = room
            .pending_draw
            .filter(|offerer| *offerer == side.opponent())
            .ok_or(CoordinatorError::NoPendingOffer)?;
        room.pending_draw = None;

        if accepted {
            tracing::info!(%match_id, "draw agreed");
            return self
                .conclude(&handle, &mut room, Outcome::Draw, EndReason::Agreement)
                .await;
        }

        tracing::info!(%match_id, %side, "draw declined");
        if let Some(offerer) = room.seats.holder(offered_by) {
            self.inner.bus.send(offerer, ServerEvent::DrawDeclined);
        }
        Ok(())
    }

    pub(super) async fn request_undo(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        claimed: Option<Side>,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        let side = reconcile_claim(match_id, room.player_side(conn)?, claimed);
        room.ensure_in_progress()?;
        if room.moves.is_empty() {
            return Err(CoordinatorError::UndoFailed("No moves to undo".into()));
        }
        let opponent = room
            .seats
            .holder(side.opponent())
            .ok_or(CoordinatorError::OpponentAbsent)?;

        room.pending_undo = Some(side);
        tracing::info!(%match_id, %side, "undo requested");
        self.inner
            .bus
            .send(opponent, ServerEvent::UndoRequested { requesting_side: side });
        Ok(())
    }

    /// Accepting pops the last ledger entry. The position broadcast is the
    /// requester's own reconstruction; it is not recomputed here.
    pub(super) async fn respond_to_undo(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        accepted: bool,
        state: Option<UndoState>,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        let side = room.player_side(conn)?;
        room.ensure_in_progress()?;
        let requested_by = room
            .pending_undo
            .filter(|requester| *requester == side.opponent())
            .ok_or(CoordinatorError::NoPendingOffer)?;
        room.pending_undo = None;
        let requester = room.seats.holder(requested_by);
        let notify_requester = |event: ServerEvent| {
            if let Some(requester) = requester {
                self.inner.bus.send(requester, event);
            }
        };

        if !accepted {
            tracing::info!(%match_id, %side, "undo declined");
            notify_requester(ServerEvent::UndoDeclined);
            return Ok(());
        }
        let Some(state) = state else {
            notify_requester(ServerEvent::UndoFailed {
                reason: "No position supplied for the undo".into(),
            });
            return Ok(());
        };
        let Some(removed) = room.moves.pop() else {
            notify_requester(ServerEvent::UndoFailed {
                reason: "No moves to undo".into(),
            });
            return Ok(());
        };

        room.current_turn = room.current_turn.opponent();
        if state.turn != room.current_turn {
            tracing::warn!(%match_id, claimed = %state.turn, actual = %room.current_turn, "undo turn mismatch");
        }
        if let Some(last_move) = state.last_move.as_deref().filter(|mv| *mv != removed.mv) {
            tracing::warn!(%match_id, claimed = last_move, actual = %removed.mv, "undo move mismatch");
        }
        tracing::info!(%match_id, removed = %removed.mv, "undo applied");

        let snapshot = room.clock_snapshot();
        if let Err(e) = self
            .inner
            .store
            .save_moves(match_id, &room.moves, &snapshot)
            .await
        {
            tracing::warn!(%match_id, "failed to persist undo: {e}");
        }

        let event = ServerEvent::UndoApplied {
            position: state.position,
            turn: room.current_turn,
            removed_move: Some(removed.mv),
        };
        self.inner.bus.broadcast(room.seats.members(), &event);
        self.broadcast_clock(&room);
        Ok(())
    }

    pub(super) async fn surrender(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        claimed: Option<Side>,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        let loser = reconcile_claim(match_id, room.player_side(conn)?, claimed);
        tracing::info!(%match_id, side = %loser, "surrender");
        self.conclude(
            &handle,
            &mut room,
            Outcome::win_for(loser.opponent()),
            EndReason::Surrender,
        )
        .await
    }

    pub(super) async fn draw_game(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        room.player_side(conn)?;
        self.conclude(&handle, &mut room, Outcome::Draw, EndReason::Agreement)
            .await
    }

    /// Client-side flag fall. Only honoured for a started clock whose server
    /// countdown is not running.
    pub(super) async fn time_up(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        losing_side: Side,
    ) -> Result<(), CoordinatorError> {
        let handle = self.member_room(conn, match_id)?;
        let mut room = handle.lock().await;
        room.player_side(conn)?;
        room.ensure_in_progress()?;
        let started = match &room.clock {
            Some(clock) => clock.started(),
            None => return Err(CoordinatorError::Untimed),
        };
        if room.countdown.is_active() || !started {
            tracing::debug!(%match_id, %losing_side, "client time-up ignored");
            return Ok(());
        }
        self.conclude(
            &handle,
            &mut room,
            Outcome::win_for(losing_side.opponent()),
            EndReason::Timeout,
        )
        .await
    }

    /// Terminal path: stop the clock, set the outcome once, persist it,
    /// tell the room, then tear the room down.
    pub(super) async fn conclude(
        &self,
        handle: &RoomHandle,
        room: &mut MatchRoom,
        outcome: Outcome,
        reason: EndReason,
    ) -> Result<(), CoordinatorError> {
        room.ensure_in_progress()?;
        let match_id = room.match_id;

        room.countdown.cancel();
        if let Some(clock) = room.clock.as_mut() {
            clock.end();
        }
        room.outcome = Some(outcome);

        match self.inner.store.record_outcome(match_id, outcome).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(%match_id, "store already had an outcome"),
            Err(e) => {
                tracing::error!(%match_id, "failed to persist outcome: {e}");
                self.inner.unsettled.insert(match_id, outcome);
            }
        }
        if room.clock.is_some() {
            let snapshot = room.clock_snapshot();
            if let Err(e) = self.inner.store.save_clock(match_id, &snapshot).await {
                tracing::warn!(%match_id, "failed to persist final clock: {e}");
            }
        }

        tracing::info!(%match_id, %outcome, ?reason, "match ended");
        self.inner
            .bus
            .broadcast(room.seats.members(), &ServerEvent::MatchEnded { outcome, reason });
        self.teardown(handle, room);
        Ok(())
    }
}
