//! The per-room countdown task.

use tokio::time::{self, Instant, MissedTickBehavior};

use match_core::{EndReason, Outcome, Tick};

use super::room::MatchRoom;
use super::{Coordinator, RoomHandle};

impl Coordinator {
    /// Both seats are filled: arm the clock, resuming the countdown straight
    /// away if a move had already started it. Returns whether a clock update
    /// went out to the room.
    pub(super) fn arm_clock(&self, handle: &RoomHandle, room: &mut MatchRoom) -> bool {
        if room.outcome.is_some() {
            return false;
        }
        let Some(clock) = room.clock.as_mut() else {
            return false;
        };
        if clock.arm() && !room.countdown.is_active() {
            tracing::info!(match_id = %room.match_id, "resuming clock");
            self.start_countdown(handle, room);
        }
        self.broadcast_clock(room);
        true
    }

    pub(super) fn start_countdown(&self, handle: &RoomHandle, room: &mut MatchRoom) {
        let epoch = room.countdown.next_epoch();
        let period = self.inner.settings.tick;
        let coordinator = self.clone();
        let handle = handle.clone();

        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !coordinator.on_tick(&handle, epoch).await {
                    break;
                }
            }
        });
        room.countdown.attach(task);
    }

    /// One countdown step. Returns false once the task should stop.
    async fn on_tick(&self, handle: &RoomHandle, epoch: u64) -> bool {
        let mut room = handle.lock().await;
        if room.closed || !room.countdown.is_current(epoch) {
            return false;
        }

        // Read under the room lock so a tick always charges the side to move
        // after the latest committed move.
        let turn = room.current_turn;
        let tick = match room.clock.as_mut() {
            Some(clock) => clock.tick(turn),
            None => Tick::Idle,
        };
        if tick == Tick::Idle {
            room.countdown.release();
            return false;
        }

        self.broadcast_clock(&room);

        match tick {
            Tick::Checkpoint => {
                let snapshot = room.clock_snapshot();
                if let Err(e) = self.inner.store.save_clock(room.match_id, &snapshot).await {
                    tracing::warn!(match_id = %room.match_id, "clock checkpoint failed: {e}");
                }
                true
            }
            Tick::Flagged(loser) => {
                tracing::info!(match_id = %room.match_id, side = %loser, "flag fell");
                room.countdown.release();
                let winner = Outcome::win_for(loser.opponent());
                if let Err(e) = self.conclude(handle, &mut room, winner, EndReason::Timeout).await {
                    tracing::debug!(match_id = %room.match_id, "timeout ignored: {e}");
                }
                false
            }
            _ => true,
        }
    }

    pub(super) fn broadcast_clock(&self, room: &MatchRoom) {
        if let Some(event) = room.clock_event() {
            self.inner.bus.broadcast(room.seats.members(), &event);
        }
    }
}
