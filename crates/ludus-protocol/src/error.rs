//! The error taxonomy carried by `fail` events.
//!
//! Every failure the broker can address back to a caller is one of these
//! kinds. The wire representation is the kind's name as a string, so the
//! enum doubles as the static wire-string ↔ kind lookup table.
//!
//! "Game completed" is deliberately absent: it is the normal control
//! outcome of a finishing move (see `ludus-games::MoveOutcome`), never a
//! failure.

use serde::{Deserialize, Serialize};

/// Coarse classification of an [`ErrorKind`], driving how the broker and
/// the client state machines react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A player behaved incorrectly. Always recoverable; reported to the
    /// offending caller, never fatal to the room.
    Player,
    /// A game engine behaved incorrectly. Reported to the offending engine
    /// connection.
    Engine,
    /// A malformed event payload. Short-circuits before any state mutation.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// A transient broker-side condition; the caller should retry.
    Internal,
}

/// Every failure kind a `fail` event can carry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
    thiserror::Error,
)]
pub enum ErrorKind {
    #[error("the specified room does not correspond to an existing room")]
    NoSuchRoom,

    #[error("the specified player does not correspond to an existing player")]
    NoSuchPlayer,

    #[error("the specified room cannot be joined as the game has already begun")]
    GameAlreadyStarted,

    #[error("the specified room is owned by a different game server")]
    UnauthorizedGameServer,

    #[error("the specified player is owned by a different connection")]
    UnauthorizedPlayer,

    #[error("the specified player is in a different room")]
    PlayerNotInRoom,

    #[error("the game in the specified room has either not started, or is already completed")]
    GameNotRunning,

    #[error("it is not currently your turn")]
    NotPlayersTurn,

    #[error("player tried to join a full game")]
    GameFull,

    #[error("player tried to join a game they are already in")]
    ExistingPlayer,

    #[error("player attempted a move that is not a legal move")]
    IllegalMove,

    #[error("the event payload failed validation")]
    InputValidationError,

    #[error("the bot already has a participant in this tournament")]
    AlreadyInTournament,

    #[error("the update's epoch is lower than one already observed for this room")]
    EpochRegression,

    #[error("the entity is locked by a concurrent operation; retry shortly")]
    LockContended,
}

impl ErrorKind {
    /// The string a `fail` event carries in its `error` field.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::NoSuchRoom => "NoSuchRoom",
            Self::NoSuchPlayer => "NoSuchPlayer",
            Self::GameAlreadyStarted => "GameAlreadyStarted",
            Self::UnauthorizedGameServer => "UnauthorizedGameServer",
            Self::UnauthorizedPlayer => "UnauthorizedPlayer",
            Self::PlayerNotInRoom => "PlayerNotInRoom",
            Self::GameNotRunning => "GameNotRunning",
            Self::NotPlayersTurn => "NotPlayersTurn",
            Self::GameFull => "GameFull",
            Self::ExistingPlayer => "ExistingPlayer",
            Self::IllegalMove => "IllegalMove",
            Self::InputValidationError => "InputValidationError",
            Self::AlreadyInTournament => "AlreadyInTournament",
            Self::EpochRegression => "EpochRegression",
            Self::LockContended => "LockContended",
        }
    }

    /// Looks a kind up from its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        const TABLE: &[(&str, ErrorKind)] = &[
            ("NoSuchRoom", ErrorKind::NoSuchRoom),
            ("NoSuchPlayer", ErrorKind::NoSuchPlayer),
            ("GameAlreadyStarted", ErrorKind::GameAlreadyStarted),
            ("UnauthorizedGameServer", ErrorKind::UnauthorizedGameServer),
            ("UnauthorizedPlayer", ErrorKind::UnauthorizedPlayer),
            ("PlayerNotInRoom", ErrorKind::PlayerNotInRoom),
            ("GameNotRunning", ErrorKind::GameNotRunning),
            ("NotPlayersTurn", ErrorKind::NotPlayersTurn),
            ("GameFull", ErrorKind::GameFull),
            ("ExistingPlayer", ErrorKind::ExistingPlayer),
            ("IllegalMove", ErrorKind::IllegalMove),
            ("InputValidationError", ErrorKind::InputValidationError),
            ("AlreadyInTournament", ErrorKind::AlreadyInTournament),
            ("EpochRegression", ErrorKind::EpochRegression),
            ("LockContended", ErrorKind::LockContended),
        ];
        TABLE.iter().find(|(n, _)| *n == name).map(|(_, k)| *k)
    }

    /// Which part of the taxonomy this kind belongs to.
    pub fn class(self) -> ErrorClass {
        match self {
            Self::GameAlreadyStarted
            | Self::UnauthorizedPlayer
            | Self::GameNotRunning
            | Self::NotPlayersTurn
            | Self::GameFull
            | Self::AlreadyInTournament => ErrorClass::Player,

            Self::UnauthorizedGameServer
            | Self::PlayerNotInRoom
            | Self::ExistingPlayer
            | Self::IllegalMove
            | Self::EpochRegression => ErrorClass::Engine,

            Self::InputValidationError => ErrorClass::Validation,

            Self::NoSuchRoom | Self::NoSuchPlayer => ErrorClass::NotFound,

            Self::LockContended => ErrorClass::Internal,
        }
    }
}
