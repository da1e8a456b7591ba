use tokio::task::JoinHandle;
use uuid::Uuid;

use match_core::{
    ClockSnapshot, ClockState, ConnectionId, MatchRecord, MoveEntry, Outcome, SeatTable,
    ServerEvent, Side, TurnClock,
};

use super::{CoordinatorError, RoomStatus};

/// In-memory state of one live match. Authoritative while it exists; the
/// durable record is brought up to date by the next successful write.
pub(crate) struct MatchRoom {
    pub match_id: Uuid,
    pub seats: SeatTable,
    /// `None` for untimed matches.
    pub clock: Option<TurnClock>,
    pub countdown: Countdown,
    pub current_turn: Side,
    pub moves: Vec<MoveEntry>,
    pub outcome: Option<Outcome>,
    pub pending_draw: Option<Side>,
    pub pending_undo: Option<Side>,
    /// Set once the room has been removed from the registry.
    pub closed: bool,
}

impl MatchRoom {
    pub fn from_record(record: &MatchRecord, persist_every: u32) -> Self {
        let clock = record
            .clock_seed()
            .map(|(white, black)| TurnClock::load(white, black, record.clock_started, persist_every));
        Self {
            match_id: record.id,
            seats: SeatTable::new(),
            clock,
            countdown: Countdown::default(),
            current_turn: record.current_turn,
            moves: record.move_history.clone(),
            outcome: record.outcome,
            pending_draw: None,
            pending_undo: None,
            closed: false,
        }
    }

    /// Side held by `conn`, or why it cannot act in this room.
    pub fn player_side(&self, conn: ConnectionId) -> Result<Side, CoordinatorError> {
        if self.closed || !self.seats.is_member(conn) {
            return Err(CoordinatorError::NotJoined);
        }
        self.seats.side_of(conn).ok_or(CoordinatorError::NotAPlayer)
    }

    pub fn ensure_in_progress(&self) -> Result<(), CoordinatorError> {
        match self.outcome {
            Some(_) => Err(CoordinatorError::MatchOver),
            None => Ok(()),
        }
    }

    pub fn clock_snapshot(&self) -> ClockSnapshot {
        match &self.clock {
            Some(clock) => clock.snapshot(self.current_turn),
            None => ClockSnapshot::untimed(self.current_turn),
        }
    }

    pub fn clock_event(&self) -> Option<ServerEvent> {
        let clock = self.clock.as_ref()?;
        Some(ServerEvent::ClockUpdate {
            white_seconds: clock.remaining(Side::White),
            black_seconds: clock.remaining(Side::Black),
            current_turn: self.current_turn,
        })
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus {
            player_count: self.seats.player_count(),
            onlooker_count: self.seats.onlooker_count(),
            has_white: self.seats.holder(Side::White).is_some(),
            has_black: self.seats.holder(Side::Black).is_some(),
            current_turn: self.current_turn,
            moves_played: self.moves.len(),
            white_seconds: self.clock.as_ref().map(|c| c.remaining(Side::White)),
            black_seconds: self.clock.as_ref().map(|c| c.remaining(Side::Black)),
            clock_running: self
                .clock
                .as_ref()
                .is_some_and(|c| c.state() == ClockState::Running),
            outcome: self.outcome,
        }
    }

    pub fn occupancy_event(&self) -> ServerEvent {
        ServerEvent::Occupancy {
            player_count: self.seats.player_count(),
            onlooker_count: self.seats.onlooker_count(),
        }
    }
}

/// Handle on the room's repeating countdown task.
///
/// Every start and stop bumps `epoch`; a tick carrying an older epoch is
/// stale and exits without touching the room. Stopping twice is a no-op.
#[derive(Default)]
pub(crate) struct Countdown {
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.task.is_some() && self.epoch == epoch
    }

    /// Reserve the epoch for a task about to be spawned.
    pub fn next_epoch(&mut self) -> u64 {
        self.cancel();
        self.epoch += 1;
        self.epoch
    }

    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    pub fn cancel(&mut self) {
        self.epoch += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Stop from inside the countdown task itself: forget the handle without
    /// aborting the caller.
    pub fn release(&mut self) {
        self.epoch += 1;
        self.task = None;
    }
}
