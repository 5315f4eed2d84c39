//! Identifier newtypes.
//!
//! Every entity id is a string token wrapped in its own type, so a
//! `PlayerId` can never be passed where a `RoomId` is expected even though
//! both are strings underneath. `#[serde(transparent)]` keeps the wire shape
//! a plain JSON string.

use std::fmt;

use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

/// Length of freshly minted entity ids.
const ID_LEN: usize = 22;

/// Generates a random alphanumeric token of the given length.
///
/// Used for entity ids and for api keys issued to bots and tournaments.
pub fn token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Mints a fresh random id.
            pub fn fresh() -> Self {
                Self(token(ID_LEN))
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifies one room (one pending or in-progress game instance).
    RoomId, "room:"
);
string_id!(
    /// Identifies one player row (an agent's seat in one room).
    PlayerId, "player:"
);
string_id!(
    /// Identifies one move-log entry within a room.
    StateId, "state:"
);
string_id!(
    /// Identifies a registered bot (an agent identity).
    BotId, "bot:"
);
string_id!(
    /// Identifies a tournament.
    TournamentId, "tournament:"
);
string_id!(
    /// Identifies a bot's enrollment in one tournament.
    ParticipantId, "participant:"
);
string_id!(
    /// Identifies a scheduled pairing of two participants.
    MatchId, "match:"
);

/// The name of a game type, used to key the rule-engine registry.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameName(pub String);

impl fmt::Display for GameName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GameName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A game-specific seat label (e.g. which side of the board a player
/// controls). Engines decide the labels; the broker only relays them.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct GameRole(pub String);

impl fmt::Display for GameRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GameRole {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
