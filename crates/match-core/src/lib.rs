//! Domain data shared by the match coordinator and its clients: sides,
//! durable record shapes, the socket protocol, seating and the turn clock.

pub mod clock;
pub mod protocol;
pub mod record;
pub mod seats;
pub mod side;

pub use clock::{ClockState, Tick, TurnClock};
pub use protocol::{ClientEvent, ServerEvent, UndoState};
pub use record::{ChatEntry, ClockSnapshot, MatchRecord, MoveEntry, NewMatch, TimeControl};
pub use seats::{ConnectionId, Departure, SeatError, SeatTable, Seated};
pub use side::{EndReason, Outcome, ParseError, Role, Side};
