//! Three-in-a-row on a 3×3 grid.

use ludus_protocol::{Board, GameRole, MovePayload};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::table::{GameRules, RulesError, Seats, Step};

pub(crate) const NAME: &str = "TicTacToe";

const ROLE_X: &str = "x";
const ROLE_O: &str = "o";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GridMove {
    row: usize,
    col: usize,
}

/// Naughts and crosses. First seat plays `x` and moves first.
#[derive(Debug, Default)]
pub struct TicTacToe {
    grid: [[Option<char>; 3]; 3],
    winner: Option<GameRole>,
}

impl TicTacToe {
    pub fn new() -> Self {
        Self::default()
    }

    fn mark_of(role: &GameRole) -> char {
        if role.0 == ROLE_X { 'x' } else { 'o' }
    }

    fn line_won(&self, mark: char) -> bool {
        let g = &self.grid;
        let m = Some(mark);
        (0..3).any(|r| (0..3).all(|c| g[r][c] == m))
            || (0..3).any(|c| (0..3).all(|r| g[r][c] == m))
            || (0..3).all(|i| g[i][i] == m)
            || (0..3).all(|i| g[i][2 - i] == m)
    }

    fn grid_full(&self) -> bool {
        self.grid
            .iter()
            .all(|row| row.iter().all(|cell| cell.is_some()))
    }
}

impl GameRules for TicTacToe {
    fn name(&self) -> &'static str {
        NAME
    }

    fn assign_role(&mut self, seats: &Seats) -> Option<GameRole> {
        if seats.role_taken(&GameRole::from(ROLE_X)) {
            Some(GameRole::from(ROLE_O))
        } else {
            Some(GameRole::from(ROLE_X))
        }
    }

    fn first_turn(&self) -> Option<GameRole> {
        Some(GameRole::from(ROLE_X))
    }

    fn init(&mut self) {
        self.grid = [[None; 3]; 3];
        self.winner = None;
    }

    fn parse_move(&self, raw: &MovePayload) -> Result<(), String> {
        let mv: GridMove = serde_json::from_value(raw.clone())
            .map_err(|e| e.to_string())?;
        if mv.row > 2 || mv.col > 2 {
            return Err("row and col must be between 0 and 2".into());
        }
        Ok(())
    }

    fn apply(
        &mut self,
        role: Option<&GameRole>,
        raw: &MovePayload,
    ) -> Result<Step, RulesError> {
        let role = role.ok_or_else(|| {
            RulesError::IllegalMove("a game role is required".into())
        })?;
        let mv: GridMove = serde_json::from_value(raw.clone())
            .map_err(|e| RulesError::IllegalMove(e.to_string()))?;

        if self.grid[mv.row][mv.col].is_some() {
            return Err(RulesError::IllegalMove(
                "attempted to play in a square that is already occupied"
                    .into(),
            ));
        }
        let mark = Self::mark_of(role);
        self.grid[mv.row][mv.col] = Some(mark);

        if self.line_won(mark) {
            self.winner = Some(role.clone());
            return Ok(Step {
                next: None,
                over: true,
            });
        }
        if self.grid_full() {
            self.winner = None;
            return Ok(Step {
                next: None,
                over: true,
            });
        }
        let next = if role.0 == ROLE_X { ROLE_O } else { ROLE_X };
        Ok(Step {
            next: Some(GameRole::from(next)),
            over: false,
        })
    }

    fn winner(&self) -> Option<GameRole> {
        self.winner.clone()
    }

    fn board(&self) -> Board {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            grid: &'a [[Option<char>; 3]; 3],
        }
        json!(Snapshot { grid: &self.grid })
    }
}
