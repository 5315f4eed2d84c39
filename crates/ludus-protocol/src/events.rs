//! The event catalog.
//!
//! Every event is a named, typed record with a fixed direction:
//!
//! ```text
//! engine → broker   create-room, join-success, join-fail, game-update
//! broker → engine   room-created, register, join-acknowledgement, player-move
//! agent  → broker   join, move, list, spectate
//! broker → agent    joined, gamestate, rooms, spectated
//! broker → any      fail
//! ```
//!
//! `rooms` and `spectated` are the synchronous replies to `list` and
//! `spectate`; they are addressed back to the requesting connection.
//!
//! The enum is internally tagged, so a `create-room` event looks like
//! `{ "type": "create-room", "name": "...", "game": "...", "maxplayers": 2 }`
//! on the wire. Validation beyond what serde enforces structurally lives in
//! [`Event::validate`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{GameName, GameRole, PlayerId, RoomId, StateId};

/// A game board snapshot. Opaque to the broker — only the rule engine that
/// produced it knows the structure.
pub type Board = serde_json::Value;

/// A move payload. Opaque to the broker; shape-checked by the rule engine.
pub type MovePayload = serde_json::Value;

/// Final score map: one entry per player, each −1, 0, or +1.
pub type Scores = BTreeMap<PlayerId, i8>;

// ---------------------------------------------------------------------------
// Supporting records
// ---------------------------------------------------------------------------

/// Room lifecycle status. Transitions only ever run
/// `lobby → playing → finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Lobby,
    Playing,
    Finished,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Playing => write!(f, "playing"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// Audience selector for a `game-update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Deliver to the whole room group and record a move-log entry.
    Broadcast,
    /// Update stored state only; spectators read it via `spectate`.
    Spectator,
    /// Deliver to exactly one player.
    Private,
}

/// Terminal record carried by the last `game-update` / `gamestate` of a
/// room. `normal: false` marks an abnormal finish (e.g. an illegal move),
/// with `fault` naming the offending player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finish {
    pub normal: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub fault: Option<PlayerId>,
    #[serde(default)]
    pub scores: Option<Scores>,
}

/// One row of the `rooms` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub name: String,
    pub game: GameName,
    pub maxplayers: usize,
    pub players: usize,
    pub status: RoomStatus,
}

/// A player row as seen by spectators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player: PlayerId,
    pub name: String,
    #[serde(default)]
    pub role: Option<GameRole>,
    pub joined: bool,
}

/// One move-log entry, in arrival order, as returned by `spectate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub state: StateId,
    #[serde(default)]
    pub player: Option<PlayerId>,
    #[serde(default)]
    pub epoch: Option<u64>,
    #[serde(default, rename = "move")]
    pub mv: Option<MovePayload>,
    #[serde(default)]
    pub board: Option<Board>,
    #[serde(default)]
    pub turn: Option<PlayerId>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Every event that crosses the broker boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    // -- engine → broker --
    /// Engine asks the broker to open a room it will own.
    CreateRoom {
        name: String,
        game: GameName,
        maxplayers: usize,
    },

    /// Engine admits a player it was asked to register.
    JoinSuccess {
        room: RoomId,
        player: PlayerId,
        #[serde(default)]
        role: Option<GameRole>,
    },

    /// Engine rejects a player it was asked to register.
    JoinFail {
        room: RoomId,
        player: PlayerId,
        #[serde(default)]
        reason: Option<String>,
    },

    /// The authoritative state-transition event. See [`Event::validate`]
    /// for the visibility/epoch/player cross-field contract.
    GameUpdate {
        room: RoomId,
        visibility: Visibility,
        #[serde(default)]
        epoch: Option<u64>,
        board: Board,
        #[serde(default)]
        state: Option<StateId>,
        #[serde(default)]
        player: Option<PlayerId>,
        #[serde(default)]
        turn: Option<PlayerId>,
        #[serde(default)]
        finish: Option<Finish>,
    },

    // -- broker → engine --
    /// Reply to `create-room` with the new room's id.
    RoomCreated { room: RoomId },

    /// Broker forwards a player's join request to the owning engine.
    Register { room: RoomId, player: PlayerId },

    /// The player's `joined` notification was confirmed delivered; the
    /// engine may count the seat as filled.
    JoinAcknowledgement { room: RoomId, player: PlayerId },

    /// Broker relays a validated move to the owning engine.
    PlayerMove {
        room: RoomId,
        player: PlayerId,
        #[serde(rename = "move")]
        mv: MovePayload,
        state: StateId,
    },

    // -- agent → broker --
    /// Agent asks to join a room under a display name.
    Join { room: RoomId, name: String },

    /// Agent submits a move.
    Move {
        room: RoomId,
        player: PlayerId,
        #[serde(rename = "move")]
        mv: MovePayload,
    },

    /// Agent requests the lobby listing (synchronous reply: `rooms`).
    List,

    /// Caller asks to watch a room (synchronous reply: `spectated`).
    Spectate { room: RoomId },

    // -- broker → agent / room group --
    /// A player entered the room. Sent once privately to the player
    /// (`broadcast: false`) and once to the room group (`broadcast: true`).
    Joined {
        room: RoomId,
        player: PlayerId,
        name: String,
        #[serde(default)]
        role: Option<GameRole>,
        broadcast: bool,
    },

    /// A game state relayed to players. `finish` is present exactly once,
    /// on the terminal update.
    Gamestate {
        room: RoomId,
        board: Board,
        epoch: u64,
        #[serde(default)]
        player: Option<PlayerId>,
        #[serde(default)]
        turn: Option<PlayerId>,
        #[serde(default)]
        finish: Option<Finish>,
    },

    /// Reply to `list`: every lobby-status room.
    Rooms { rooms: BTreeMap<RoomId, RoomSummary> },

    /// Reply to `spectate`: the room snapshot plus the ordered move log.
    Spectated {
        room: RoomId,
        #[serde(default)]
        board: Option<Board>,
        status: RoomStatus,
        players: Vec<PlayerInfo>,
        #[serde(default)]
        turn: Option<PlayerId>,
        moves: Vec<StateEntry>,
    },

    // -- broker → any --
    /// Structured failure addressed back to the sender of the event named
    /// in `responding_to`.
    Fail {
        error: String,
        details: String,
        #[serde(rename = "respondingTo")]
        responding_to: String,
    },
}

impl Event {
    /// The event's wire name (the value of the `type` tag).
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create-room",
            Self::JoinSuccess { .. } => "join-success",
            Self::JoinFail { .. } => "join-fail",
            Self::GameUpdate { .. } => "game-update",
            Self::RoomCreated { .. } => "room-created",
            Self::Register { .. } => "register",
            Self::JoinAcknowledgement { .. } => "join-acknowledgement",
            Self::PlayerMove { .. } => "player-move",
            Self::Join { .. } => "join",
            Self::Move { .. } => "move",
            Self::List => "list",
            Self::Spectate { .. } => "spectate",
            Self::Joined { .. } => "joined",
            Self::Gamestate { .. } => "gamestate",
            Self::Rooms { .. } => "rooms",
            Self::Spectated { .. } => "spectated",
            Self::Fail { .. } => "fail",
        }
    }

    /// Checks the cross-field contract serde cannot express.
    ///
    /// A violation never mutates broker state; the broker answers it with a
    /// `fail` carrying `InputValidationError` and the returned detail.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::CreateRoom {
                name,
                game,
                maxplayers,
            } => {
                if name.is_empty() {
                    return Err("room name must not be empty".into());
                }
                if game.0.is_empty() {
                    return Err("game name must not be empty".into());
                }
                if *maxplayers < 1 {
                    return Err("maxplayers must be at least 1".into());
                }
                Ok(())
            }
            Self::Join { name, .. } => {
                if name.is_empty() {
                    return Err("player name must not be empty".into());
                }
                Ok(())
            }
            Self::GameUpdate {
                visibility,
                epoch,
                player,
                ..
            } => match visibility {
                Visibility::Private => {
                    if player.is_none() {
                        return Err(
                            "private update requires a target player".into()
                        );
                    }
                    if epoch.is_some() {
                        return Err(
                            "private update must not carry an epoch".into(),
                        );
                    }
                    Ok(())
                }
                Visibility::Broadcast | Visibility::Spectator => {
                    if epoch.is_none() {
                        return Err(format!(
                            "{visibility:?} update requires an epoch"
                        )
                        .to_lowercase());
                    }
                    if player.is_some() {
                        return Err(format!(
                            "{visibility:?} update must not target a player"
                        )
                        .to_lowercase());
                    }
                    Ok(())
                }
            },
            _ => Ok(()),
        }
    }
}
