//! Entity records.
//!
//! A [`Room`] exclusively owns its [`Player`] rows and its [`GameState`]
//! move log; a [`Tournament`] owns its [`Participant`]s, [`Match`]es, and
//! live [`PlayerQueueEntry`]s. Sharing happens only through the store's
//! per-entity-group locks.

use std::time::SystemTime;

use ludus_protocol::{
    Board, BotId, GameName, GameRole, MatchId, MovePayload, ParticipantId,
    PlayerId, RoomId, RoomStatus, StateId, TournamentId,
};
use ludus_transport::ConnectionId;

/// One pending or in-progress game instance, owned by one engine
/// connection.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub game: GameName,
    pub maxplayers: usize,
    /// The engine connection that created (and owns) this room.
    pub engine_conn: ConnectionId,
    pub board: Option<Board>,
    pub status: RoomStatus,
    /// The player to move, while a game is running.
    pub turn: Option<PlayerId>,
    /// Set when the room finishes: `true` for a played-out game, `false`
    /// for an abnormal finish.
    pub normal_finish: Option<bool>,
    pub created_at: SystemTime,
    /// Highest epoch observed so far. The engine assigns epochs; the
    /// broker enforces that arrivals never regress below this.
    pub last_epoch: u64,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Move log in arrival order. Append-mostly: an entry is only ever
    /// rewritten through [`Room::upsert_state`] with a matching id.
    pub states: Vec<GameState>,
}

impl Room {
    pub fn new(
        name: String,
        game: GameName,
        maxplayers: usize,
        engine_conn: ConnectionId,
    ) -> Self {
        Self {
            id: RoomId::fresh(),
            name,
            game,
            maxplayers,
            engine_conn,
            board: None,
            status: RoomStatus::Lobby,
            turn: None,
            normal_finish: None,
            created_at: SystemTime::now(),
            last_epoch: 0,
            players: Vec::new(),
            states: Vec::new(),
        }
    }

    /// The hub group every occupant of this room belongs to.
    pub fn broadcast_group(&self) -> String {
        format!("room:{}", self.id.as_str())
    }

    /// The hub group holding spectators only.
    pub fn spectator_group(&self) -> String {
        format!("spectators:{}", self.id.as_str())
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    /// Appends a move-log entry.
    pub fn push_state(&mut self, state: GameState) {
        self.states.push(state);
    }

    /// Updates the entry with the given id in place, or appends a new one.
    /// This is the idempotent-retry path: a resent update with the same
    /// state id never duplicates a row.
    pub fn upsert_state(
        &mut self,
        id: StateId,
        epoch: u64,
        board: Board,
        turn: Option<PlayerId>,
    ) {
        match self.states.iter_mut().find(|s| s.id == id) {
            Some(existing) => {
                existing.epoch = Some(epoch);
                existing.board = Some(board);
                existing.turn = turn;
            }
            None => self.states.push(GameState {
                id,
                player: None,
                epoch: Some(epoch),
                mv: None,
                board: Some(board),
                turn,
                timestamp: SystemTime::now(),
            }),
        }
    }
}

/// An agent's seat in one room.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// The agent connection this player belongs to.
    pub conn: ConnectionId,
    /// The bot identity behind the connection, when authenticated.
    pub bot: Option<BotId>,
    /// Whether the engine confirmed admission.
    pub joined: bool,
    pub role: Option<GameRole>,
    pub joined_at: SystemTime,
}

impl Player {
    pub fn new(name: String, conn: ConnectionId, bot: Option<BotId>) -> Self {
        Self {
            id: PlayerId::fresh(),
            name,
            conn,
            bot,
            joined: false,
            role: None,
            joined_at: SystemTime::now(),
        }
    }
}

/// One move-log entry. The engine is the epoch authority; entries written
/// for a player's `move` event carry the move payload, entries written for
/// an engine's broadcast update carry the board snapshot.
#[derive(Debug, Clone)]
pub struct GameState {
    pub id: StateId,
    pub player: Option<PlayerId>,
    pub epoch: Option<u64>,
    pub mv: Option<MovePayload>,
    pub board: Option<Board>,
    pub turn: Option<PlayerId>,
    pub timestamp: SystemTime,
}

impl GameState {
    /// A fresh entry recording a player's move, before the engine has
    /// applied it.
    pub fn for_move(player: PlayerId, mv: MovePayload) -> Self {
        Self {
            id: StateId::fresh(),
            player: Some(player),
            epoch: None,
            mv: Some(mv),
            board: None,
            turn: None,
            timestamp: SystemTime::now(),
        }
    }
}

/// A registered bot: the identity behind agent connections.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: BotId,
    pub name: String,
    pub api_key: String,
}

/// A tournament: a named round-robin over enrolled bots for one game.
#[derive(Debug, Clone)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub game: GameName,
    pub api_key: String,
    pub participants: Vec<Participant>,
    pub matches: Vec<Match>,
    /// Live connections per participant; exists only while connected.
    pub queue: Vec<PlayerQueueEntry>,
}

impl Tournament {
    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn participant_for_bot(&self, bot: &BotId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.bot == bot)
    }
}

/// A bot's enrollment in one tournament.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: ParticipantId,
    /// Unique within the tournament; drives deterministic match indices.
    pub index: u32,
    pub bot: BotId,
    pub disqualified: bool,
}

/// Lifecycle of a scheduled match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Pending,
    Running,
    Completed,
    Errored,
    Deleted,
}

/// A pairing of exactly two participants within one tournament.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: MatchId,
    /// Deterministic global ordering key, derived from both participants'
    /// indices so the same unordered pair can never be created twice.
    pub index: u64,
    pub state: MatchState,
    pub players: [ParticipantId; 2],
    /// Filled in once the match is actually played.
    pub room: Option<RoomId>,
}

/// Records that a participant currently has a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQueueEntry {
    pub tournament: TournamentId,
    pub conn: ConnectionId,
    pub participant: ParticipantId,
}
