//! Seat table for one room: who holds white, who holds black, who is watching.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::side::Side;

/// Coordinator-assigned identity of one live socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SeatError {
    #[error("both sides are already taken")]
    RoomFull,
}

/// Result of seating a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seated {
    pub side: Side,
    /// False when the connection already held this seat.
    pub fresh: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    Player(Side),
    Onlooker,
}

/// A connection is never both a player and an onlooker, and each side has at
/// most one holder.
#[derive(Debug, Default, Clone)]
pub struct SeatTable {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
    onlookers: BTreeSet<ConnectionId>,
}

impl SeatTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, side: Side) -> Option<ConnectionId> {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<ConnectionId> {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    /// Seat `conn` on the first free side (white, then black). Re-seating a
    /// connection that already holds a side returns that side unchanged.
    /// Fails without touching the table when both sides belong to others.
    pub fn seat_player(&mut self, conn: ConnectionId) -> Result<Seated, SeatError> {
        if let Some(side) = self.side_of(conn) {
            return Ok(Seated { side, fresh: false });
        }
        let side = Side::ALL
            .into_iter()
            .find(|side| self.slot(*side).is_none())
            .ok_or(SeatError::RoomFull)?;
        self.onlookers.remove(&conn);
        *self.slot_mut(side) = Some(conn);
        Ok(Seated { side, fresh: true })
    }

    /// Move `conn` to the onlooker set. Returns the side it vacated, if any.
    pub fn seat_onlooker(&mut self, conn: ConnectionId) -> Option<Side> {
        let vacated = self.side_of(conn);
        if let Some(side) = vacated {
            *self.slot_mut(side) = None;
        }
        self.onlookers.insert(conn);
        vacated
    }

    pub fn remove(&mut self, conn: ConnectionId) -> Option<Departure> {
        if let Some(side) = self.side_of(conn) {
            *self.slot_mut(side) = None;
            return Some(Departure::Player(side));
        }
        self.onlookers.remove(&conn).then_some(Departure::Onlooker)
    }

    pub fn side_of(&self, conn: ConnectionId) -> Option<Side> {
        Side::ALL.into_iter().find(|side| self.slot(*side) == Some(conn))
    }

    pub fn holder(&self, side: Side) -> Option<ConnectionId> {
        self.slot(side)
    }

    pub fn is_member(&self, conn: ConnectionId) -> bool {
        self.side_of(conn).is_some() || self.onlookers.contains(&conn)
    }

    pub fn player_count(&self) -> usize {
        self.white.is_some() as usize + self.black.is_some() as usize
    }

    pub fn onlooker_count(&self) -> usize {
        self.onlookers.len()
    }

    pub fn has_players(&self) -> bool {
        self.player_count() > 0
    }

    pub fn is_full(&self) -> bool {
        self.player_count() == 2
    }

    pub fn players(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.white.into_iter().chain(self.black)
    }

    /// Players first, then onlookers.
    pub fn members(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.players().chain(self.onlookers.iter().copied())
    }
}
