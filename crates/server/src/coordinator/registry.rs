//! Room lifecycle: lazy creation, seating, departures and teardown.

use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use match_core::{ConnectionId, Departure, MatchRecord, Role, SeatError, ServerEvent};

use super::room::MatchRoom;
use super::{Coordinator, CoordinatorError, RoomHandle};

impl Coordinator {
    pub(super) async fn join(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
        label: Option<String>,
        role: Role,
    ) -> Result<(), CoordinatorError> {
        let previous = self.inner.membership.get(&conn).map(|m| *m.value());
        if let Some(previous) = previous.filter(|prev| *prev != match_id) {
            tracing::debug!(%conn, from = %previous, to = %match_id, "leaving previous match");
            self.inner.membership.remove_if(&conn, |_, m| *m == previous);
            self.leave(conn, previous).await;
        }

        let (handle, mut room) = self.lock_live_room(match_id).await?;
        tracing::info!(
            %conn,
            %match_id,
            label = label.as_deref().unwrap_or("-"),
            ?role,
            "join"
        );

        let bus = &self.inner.bus;
        let mut clock_broadcast = false;
        match role {
            Role::Onlooker => {
                if room.seats.seat_onlooker(conn).is_some() {
                    self.release_seat(&mut room).await;
                    // Last player stepped down: same as the last player leaving.
                    if !room.seats.has_players() {
                        tracing::info!(%conn, %match_id, "last player became an onlooker");
                        bus.broadcast(room.seats.members(), &room.occupancy_event());
                        self.teardown(&handle, &mut room);
                        return Ok(());
                    }
                }
                self.inner.membership.insert(conn, match_id);
                bus.send(conn, ServerEvent::AssignedRole { role });
            }
            Role::Player => {
                let seated = room.seats.seat_player(conn).map_err(|e| match e {
                    SeatError::RoomFull => CoordinatorError::RoomFull,
                })?;
                self.inner.membership.insert(conn, match_id);
                bus.send(conn, ServerEvent::AssignedRole { role });
                bus.send(conn, ServerEvent::AssignedSide { side: seated.side });
                tracing::info!(%conn, %match_id, side = %seated.side, "seated");

                if seated.fresh && room.seats.is_full() {
                    clock_broadcast = self.arm_clock(&handle, &mut room);
                }
            }
        }

        bus.send(
            conn,
            ServerEvent::MoveHistorySnapshot {
                entries: room.moves.clone(),
                outcome: room.outcome,
            },
        );
        match self.inner.store.chat_history(match_id).await {
            Ok(entries) => bus.send(conn, ServerEvent::ChatHistorySnapshot { entries }),
            Err(e) => tracing::warn!(%match_id, "failed to load chat history: {e}"),
        }
        if !clock_broadcast {
            if let Some(clock) = room.clock_event() {
                bus.send(conn, clock);
            }
        }

        bus.broadcast(room.seats.members(), &room.occupancy_event());
        Ok(())
    }

    /// Find or lazily create the room for `match_id` and lock it. Retries if
    /// the room was torn down between lookup and lock.
    async fn lock_live_room(
        &self,
        match_id: Uuid,
    ) -> Result<(RoomHandle, OwnedMutexGuard<MatchRoom>), CoordinatorError> {
        loop {
            let handle = self.resolve_room(match_id).await?;
            let room = handle.clone().lock_owned().await;
            if !room.closed {
                return Ok((handle, room));
            }
        }
    }

    async fn resolve_room(&self, match_id: Uuid) -> Result<RoomHandle, CoordinatorError> {
        if let Some(handle) = self.inner.rooms.get(&match_id) {
            return Ok(handle.value().clone());
        }

        let record = self
            .inner
            .store
            .fetch_match(match_id)
            .await?
            .ok_or(CoordinatorError::MatchNotFound)?;
        let record = self.settle_outcome(record).await;
        let room = MatchRoom::from_record(&record, self.inner.settings.persist_every);

        let handle = self
            .inner
            .rooms
            .entry(match_id)
            .or_insert_with(|| {
                tracing::debug!(%match_id, "room created");
                Arc::new(Mutex::new(room))
            })
            .value()
            .clone();
        Ok(handle)
    }

    /// Carry over an outcome whose write failed when the match ended and
    /// retry that write. The registry copy wins until the store has one.
    async fn settle_outcome(&self, mut record: MatchRecord) -> MatchRecord {
        let match_id = record.id;
        let Some(outcome) = self.inner.unsettled.get(&match_id).map(|o| *o.value()) else {
            return record;
        };
        if record.outcome.is_some() {
            self.inner.unsettled.remove(&match_id);
            return record;
        }

        match self.inner.store.record_outcome(match_id, outcome).await {
            Ok(true) => {
                tracing::info!(%match_id, %outcome, "outcome settled");
                self.inner.unsettled.remove(&match_id);
            }
            Ok(false) => {
                tracing::warn!(%match_id, "store gained an outcome while unsettled");
                self.inner.unsettled.remove(&match_id);
                if let Ok(Some(stored)) = self.inner.store.fetch_match(match_id).await {
                    return stored;
                }
            }
            Err(e) => tracing::warn!(%match_id, "outcome still unsettled: {e}"),
        }
        record.outcome = Some(outcome);
        record
    }

    /// Room `conn` has joined as `match_id`, pruning a stale membership.
    pub(super) fn member_room(
        &self,
        conn: ConnectionId,
        match_id: Uuid,
    ) -> Result<RoomHandle, CoordinatorError> {
        let joined = self.inner.membership.get(&conn).map(|m| *m.value());
        if joined != Some(match_id) {
            return Err(CoordinatorError::NotJoined);
        }
        match self.inner.rooms.get(&match_id) {
            Some(handle) => Ok(handle.value().clone()),
            None => {
                self.inner.membership.remove_if(&conn, |_, m| *m == match_id);
                Err(CoordinatorError::NotJoined)
            }
        }
    }

    /// Remove `conn` from the room for `match_id`. Unknown or stale
    /// memberships are ignored.
    pub(super) async fn leave(&self, conn: ConnectionId, match_id: Uuid) {
        let Some(handle) = self.inner.rooms.get(&match_id).map(|h| h.value().clone()) else {
            return;
        };
        let mut room = handle.lock().await;
        if room.closed {
            return;
        }
        let Some(departure) = room.seats.remove(conn) else {
            return;
        };
        tracing::info!(%conn, %match_id, ?departure, "left");

        if let Departure::Player(_) = departure {
            self.release_seat(&mut room).await;
        }

        self.inner
            .bus
            .broadcast(room.seats.members(), &room.occupancy_event());

        if !room.seats.has_players() {
            self.teardown(&handle, &mut room);
        }
    }

    /// A player gave up a seat: drop open negotiations, stop the countdown
    /// until the room is full again and checkpoint the clock while someone is
    /// still seated.
    async fn release_seat(&self, room: &mut MatchRoom) {
        room.pending_draw = None;
        room.pending_undo = None;
        room.countdown.cancel();
        let Some(clock) = room.clock.as_mut() else {
            return;
        };
        clock.suspend();
        if room.seats.has_players() {
            let snapshot = room.clock_snapshot();
            if let Err(e) = self.inner.store.save_clock(room.match_id, &snapshot).await {
                tracing::warn!(match_id = %room.match_id, "failed to checkpoint clock on leave: {e}");
            }
        }
    }

    /// Drop the room from the registry. The durable record is untouched.
    pub(super) fn teardown(&self, handle: &RoomHandle, room: &mut MatchRoom) {
        let match_id = room.match_id;
        room.closed = true;
        room.countdown.cancel();
        room.pending_draw = None;
        room.pending_undo = None;
        for conn in room.seats.members() {
            self.inner.membership.remove_if(&conn, |_, m| *m == match_id);
        }
        self.inner
            .rooms
            .remove_if(&match_id, |_, current| Arc::ptr_eq(current, handle));
        tracing::debug!(%match_id, "room discarded");
    }
}
