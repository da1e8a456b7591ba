use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::side::{Outcome, ParseError, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    #[default]
    Unlimited,
    Timed,
}

impl TimeControl {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeControl::Unlimited => "unlimited",
            TimeControl::Timed => "timed",
        }
    }
}

impl FromStr for TimeControl {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unlimited" => Ok(TimeControl::Unlimited),
            "timed" => Ok(TimeControl::Timed),
            // Older rows stored the raw minutes label
            other if other.parse::<u32>().is_ok() => Ok(TimeControl::Timed),
            other => Err(ParseError::new("time control", other)),
        }
    }
}

/// One ledger entry: the move as reported and the position it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEntry {
    #[serde(rename = "move")]
    pub mv: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub sender: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Clock fields of the durable record, written on moves, checkpoints and
/// disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white_seconds: Option<u32>,
    pub black_seconds: Option<u32>,
    pub current_turn: Side,
    pub clock_started: bool,
}

impl ClockSnapshot {
    pub fn untimed(current_turn: Side) -> Self {
        Self {
            white_seconds: None,
            black_seconds: None,
            current_turn,
            clock_started: false,
        }
    }
}

/// Durable state of a match. Created by the creation API, mutated by the
/// coordinator, never deleted by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: Uuid,
    pub time_control: TimeControl,
    /// Minutes per side; present only for timed matches.
    pub time_limit: Option<u32>,
    pub spectator_link: Option<String>,
    pub is_private: bool,
    pub move_history: Vec<MoveEntry>,
    pub white_seconds: Option<u32>,
    pub black_seconds: Option<u32>,
    pub current_turn: Side,
    pub clock_started: bool,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn is_timed(&self) -> bool {
        self.time_control == TimeControl::Timed && self.time_limit.is_some()
    }

    /// Seconds each side starts with, or `None` for untimed matches.
    pub fn initial_seconds(&self) -> Option<u32> {
        if !self.is_timed() {
            return None;
        }
        self.time_limit.map(|minutes| minutes.saturating_mul(60))
    }

    /// Remaining `(white, black)` seconds to arm a clock with: the last
    /// persisted values, falling back to the full allowance.
    pub fn clock_seed(&self) -> Option<(u32, u32)> {
        let initial = self.initial_seconds()?;
        Some((
            self.white_seconds.unwrap_or(initial),
            self.black_seconds.unwrap_or(initial),
        ))
    }
}

/// Parameters accepted by the creation API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMatch {
    #[serde(default)]
    pub time_control: TimeControl,
    pub time_limit: Option<u32>,
    pub spectator_link: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

impl NewMatch {
    pub const MAX_MINUTES: u32 = 180;

    pub fn validate(&self) -> Result<(), String> {
        match (self.time_control, self.time_limit) {
            (TimeControl::Timed, None) => Err("time_limit is required for timed matches".into()),
            (TimeControl::Timed, Some(0)) => Err("time_limit must be at least 1 minute".into()),
            (TimeControl::Timed, Some(m)) if m > Self::MAX_MINUTES => Err(format!(
                "time_limit must be at most {} minutes",
                Self::MAX_MINUTES
            )),
            _ => Ok(()),
        }
    }

    /// Fresh record: empty ledger, white to move, clock not started.
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> MatchRecord {
        let time_limit = match self.time_control {
            TimeControl::Timed => self.time_limit,
            TimeControl::Unlimited => None,
        };
        MatchRecord {
            id,
            time_control: self.time_control,
            time_limit,
            spectator_link: self.spectator_link,
            is_private: self.is_private,
            move_history: Vec::new(),
            white_seconds: None,
            black_seconds: None,
            current_turn: Side::White,
            clock_started: false,
            outcome: None,
            created_at,
        }
    }
}
