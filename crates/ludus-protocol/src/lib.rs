//! Wire protocol for the Ludus game arena.
//!
//! Everything that travels between a game-engine process, the broker, and an
//! agent process is defined here: identifier newtypes, the typed event
//! catalog with its validation contract, and the error taxonomy that `fail`
//! events carry.
//!
//! # Key types
//!
//! - [`Event`] — the full event catalog, one variant per wire event
//! - [`ErrorKind`] — every failure a `fail` event can name
//! - [`Visibility`] / [`Finish`] — audience selector and terminal record
//!   for game updates

mod error;
mod events;
mod ids;

pub use error::{ErrorClass, ErrorKind};
pub use events::{
    Board, Event, Finish, MovePayload, PlayerInfo, RoomStatus, RoomSummary,
    Scores, StateEntry, Visibility,
};
pub use ids::{
    token, BotId, GameName, GameRole, MatchId, ParticipantId, PlayerId,
    RoomId, StateId, TournamentId,
};
