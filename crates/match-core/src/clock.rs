//! Per-room turn clock.
//!
//! `Dormant -> Armed -> Running -> Ended`. Armed means both players are seated
//! and the remaining seconds are loaded; the first accepted move starts it.
//! A running clock drops back to `Dormant` when a player leaves and is re-armed
//! (resuming immediately if it had started) when the room is full again.
//! `Ended` is terminal.

use crate::record::ClockSnapshot;
use crate::side::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Dormant,
    Armed,
    Running,
    Ended,
}

/// What the countdown should do after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Clock is not running; the countdown should stop.
    Idle,
    /// Broadcast only.
    Continue,
    /// Broadcast and persist the remaining seconds.
    Checkpoint,
    /// The side ran out of time. The clock is now `Ended`.
    Flagged(Side),
}

#[derive(Debug, Clone)]
pub struct TurnClock {
    white: u32,
    black: u32,
    state: ClockState,
    started: bool,
    ticks: u64,
    persist_every: u32,
}

impl TurnClock {
    /// Load remaining seconds. The clock starts `Dormant`.
    pub fn load(white: u32, black: u32, started: bool, persist_every: u32) -> Self {
        Self {
            white,
            black,
            state: ClockState::Dormant,
            started,
            ticks: 0,
            persist_every: persist_every.max(1),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Whether a move has ever started this clock.
    pub fn started(&self) -> bool {
        self.started
    }

    pub fn remaining(&self, side: Side) -> u32 {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    /// `Dormant -> Armed`, or straight to `Running` if a move already started
    /// this clock. Returns true when the clock is now running.
    pub fn arm(&mut self) -> bool {
        if self.state != ClockState::Dormant {
            return self.is_running();
        }
        self.state = if self.started {
            ClockState::Running
        } else {
            ClockState::Armed
        };
        self.is_running()
    }

    /// `Armed -> Running` on the first accepted move. Returns true only on
    /// that transition.
    pub fn start(&mut self) -> bool {
        if self.state != ClockState::Armed {
            return false;
        }
        self.state = ClockState::Running;
        self.started = true;
        true
    }

    /// Stop counting but keep the remaining seconds for a later `arm`.
    pub fn suspend(&mut self) {
        if matches!(self.state, ClockState::Armed | ClockState::Running) {
            self.state = ClockState::Dormant;
        }
    }

    pub fn end(&mut self) {
        self.state = ClockState::Ended;
    }

    /// Charge one second to `turn`. Never touches the other side.
    pub fn tick(&mut self, turn: Side) -> Tick {
        if self.state != ClockState::Running {
            return Tick::Idle;
        }
        let remaining = match turn {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        };
        *remaining = remaining.saturating_sub(1);
        self.ticks += 1;

        if *remaining == 0 {
            self.state = ClockState::Ended;
            Tick::Flagged(turn)
        } else if self.ticks % u64::from(self.persist_every) == 0 {
            Tick::Checkpoint
        } else {
            Tick::Continue
        }
    }

    pub fn snapshot(&self, current_turn: Side) -> ClockSnapshot {
        ClockSnapshot {
            white_seconds: Some(self.white),
            black_seconds: Some(self.black),
            current_turn,
            clock_started: self.started,
        }
    }
}
