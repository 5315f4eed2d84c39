//! The shared table: seating, turn tracking, and the universal move
//! preconditions every game gets for free.

use std::collections::HashMap;

use ludus_protocol::{
    Board, ErrorKind, GameName, GameRole, MovePayload, PlayerId, Scores,
};

/// Errors a rule engine (or the table around it) can raise.
///
/// Game completion is *not* here — see [`MoveOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum RulesError {
    #[error("player tried to join a full game")]
    GameFull,

    #[error("player tried to join a game they are already in")]
    ExistingPlayer,

    #[error("the game has either not started, or is already completed")]
    GameNotRunning,

    #[error("it is not currently your turn")]
    NotPlayersTurn,

    /// The move was malformed or against the rules. The string is a
    /// human-readable reason; fault lies with the mover.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

impl RulesError {
    /// The wire error kind this maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GameFull => ErrorKind::GameFull,
            Self::ExistingPlayer => ErrorKind::ExistingPlayer,
            Self::GameNotRunning => ErrorKind::GameNotRunning,
            Self::NotPlayersTurn => ErrorKind::NotPlayersTurn,
            Self::IllegalMove(_) => ErrorKind::IllegalMove,
        }
    }
}

/// The two ways a legal move can land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on.
    Playing,
    /// This move completed the game; scores are now valid.
    Completed,
}

/// What a rules engine reports back from one applied move.
#[derive(Debug, Clone)]
pub struct Step {
    /// The role to move next. `None` with `over: false` never happens for
    /// the built-in games; `None` with `over: true` is the usual terminal.
    pub next: Option<GameRole>,
    /// Whether this move completed the game.
    pub over: bool,
}

/// Seat bookkeeping shared by every game: who joined, in what order, and
/// under which role.
#[derive(Debug, Default)]
pub struct Seats {
    order: Vec<PlayerId>,
    roles: HashMap<PlayerId, Option<GameRole>>,
    by_role: HashMap<GameRole, PlayerId>,
}

impl Seats {
    /// Players in join order.
    pub fn players(&self) -> &[PlayerId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, player: &PlayerId) -> bool {
        self.roles.contains_key(player)
    }

    /// The role a seated player holds, if any.
    pub fn role_of(&self, player: &PlayerId) -> Option<&GameRole> {
        self.roles.get(player).and_then(|r| r.as_ref())
    }

    /// The player holding a role.
    pub fn holder(&self, role: &GameRole) -> Option<&PlayerId> {
        self.by_role.get(role)
    }

    /// `true` if some seated player already holds this role.
    pub fn role_taken(&self, role: &GameRole) -> bool {
        self.by_role.contains_key(role)
    }

    fn seat(&mut self, player: PlayerId, role: Option<GameRole>) {
        if let Some(role) = &role {
            self.by_role.insert(role.clone(), player.clone());
        }
        self.order.push(player.clone());
        self.roles.insert(player, role);
    }
}

/// The contract every game implements.
///
/// Implementations own their typed board and expose it as an opaque JSON
/// snapshot through [`GameRules::board`] — which may filter for visibility
/// (e.g. hiding pending simultaneous choices).
pub trait GameRules: Send {
    /// The registry name of this game.
    fn name(&self) -> &'static str;

    /// Seats required before the game can start.
    fn max_players(&self) -> usize {
        2
    }

    /// Picks a role for the next player to be seated. Default: no role.
    fn assign_role(&mut self, _seats: &Seats) -> Option<GameRole> {
        None
    }

    /// The role that moves first.
    fn first_turn(&self) -> Option<GameRole>;

    /// Sets up the initial board. Called once, when all seats are filled.
    fn init(&mut self);

    /// Shape-checks a raw move payload. The returned string is the
    /// human-readable reason shown to the mover.
    fn parse_move(&self, raw: &MovePayload) -> Result<(), String>;

    /// Applies a shape-valid move for the given role.
    fn apply(
        &mut self,
        role: Option<&GameRole>,
        raw: &MovePayload,
    ) -> Result<Step, RulesError>;

    /// The winning role of a completed game; `None` means a draw.
    fn winner(&self) -> Option<GameRole>;

    /// A snapshot of the board, filtered for general visibility.
    fn board(&self) -> Board;
}

/// One game in progress: a rules engine plus the shared state around it.
pub struct Table {
    rules: Box<dyn GameRules>,
    seats: Seats,
    playing: bool,
    completed: bool,
    move_number: u64,
    turn: Option<PlayerId>,
}

impl Table {
    pub fn new(rules: Box<dyn GameRules>) -> Self {
        Self {
            rules,
            seats: Seats::default(),
            playing: false,
            completed: false,
            move_number: 0,
            turn: None,
        }
    }

    pub fn game(&self) -> GameName {
        GameName::from(self.rules.name())
    }

    pub fn max_players(&self) -> usize {
        self.rules.max_players()
    }

    pub fn players(&self) -> &[PlayerId] {
        self.seats.players()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.rules.max_players()
    }

    pub fn playing(&self) -> bool {
        self.playing
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Sequence number of the latest state transition. The engine process
    /// stamps this onto every update it emits.
    pub fn epoch(&self) -> u64 {
        self.move_number
    }

    /// The player to move, while the game is running.
    pub fn turn(&self) -> Option<&PlayerId> {
        self.turn.as_ref()
    }

    /// Seats a player and returns their assigned role.
    pub fn add_player(
        &mut self,
        player: PlayerId,
    ) -> Result<Option<GameRole>, RulesError> {
        if self.seats.contains(&player) {
            return Err(RulesError::ExistingPlayer);
        }
        if self.is_full() {
            return Err(RulesError::GameFull);
        }
        let role = self.rules.assign_role(&self.seats);
        tracing::debug!(%player, role = ?role, "seating player");
        self.seats.seat(player, role.clone());
        Ok(role)
    }

    /// Starts the game: initial board, first turn. The caller decides when
    /// (normally once every seat's join is acknowledged).
    pub fn start(&mut self) {
        self.rules.init();
        self.playing = true;
        self.turn = self
            .rules
            .first_turn()
            .and_then(|role| self.seats.holder(&role).cloned());
        tracing::info!(game = %self.game(), turn = ?self.turn, "game started");
    }

    /// Applies one move, enforcing the universal preconditions first:
    /// the game must be running, the mover must hold the turn, and the
    /// payload must pass the engine's move-shape check (re-signaled as
    /// [`RulesError::IllegalMove`] with the mover at fault).
    pub fn make_move(
        &mut self,
        player: &PlayerId,
        raw: &MovePayload,
    ) -> Result<MoveOutcome, RulesError> {
        if !self.playing {
            return Err(RulesError::GameNotRunning);
        }
        if self.turn.as_ref() != Some(player) {
            return Err(RulesError::NotPlayersTurn);
        }
        self.rules
            .parse_move(raw)
            .map_err(RulesError::IllegalMove)?;

        self.move_number += 1;
        let role = self.seats.role_of(player).cloned();
        let step = self.rules.apply(role.as_ref(), raw)?;

        if step.over {
            self.playing = false;
            self.completed = true;
            self.turn = None;
            return Ok(MoveOutcome::Completed);
        }
        self.turn = step
            .next
            .and_then(|role| self.seats.holder(&role).cloned());
        Ok(MoveOutcome::Playing)
    }

    /// Final scores. Valid only after [`MoveOutcome::Completed`]: a draw is
    /// all zeros, a decisive result is one +1 with the rest at −1.
    pub fn score(&self) -> Scores {
        let winner = self
            .rules
            .winner()
            .and_then(|role| self.seats.holder(&role).cloned());
        self.seats
            .players()
            .iter()
            .map(|p| {
                let score = match &winner {
                    Some(w) if w == p => 1,
                    Some(_) => -1,
                    None => 0,
                };
                (p.clone(), score)
            })
            .collect()
    }

    /// The current board snapshot, filtered for general visibility.
    pub fn board(&self) -> Board {
        self.rules.board()
    }
}
