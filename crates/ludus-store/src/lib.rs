//! The persisted-entity collaborator.
//!
//! The broker and the matchmaker read and mutate shared state through this
//! crate: rooms (each exclusively owning its players and move log),
//! registered bots, and tournaments (each owning its participants, matches,
//! and live player queue).
//!
//! Every room and every tournament sits behind its own [`TimedMutex`]: a
//! mutex acquired with a bounded timeout and brief retry backoff, so a
//! racing update stalls briefly and then fails with
//! [`StoreError::LockContended`] instead of blocking unboundedly. All
//! mutations to one room's board/turn/status happen while holding that
//! room's lock, which totally orders them; no ordering holds across rooms.

mod entities;
mod error;
mod lock;
mod store;

pub use entities::{
    Bot, GameState, Match, MatchState, Participant, Player,
    PlayerQueueEntry, Room, Tournament,
};
pub use error::StoreError;
pub use lock::{LockConfig, TimedMutex};
pub use store::Store;
