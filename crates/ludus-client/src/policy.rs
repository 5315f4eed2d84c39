//! Move policies: how an agent picks its next move for each game.

use ludus_protocol::{Board, GameName, GameRole, MovePayload};
use rand::seq::IndexedRandom;
use serde_json::json;

/// Computes a move from the latest board snapshot. Implementations may
/// keep state between turns (none of the random ones do).
pub trait MovePolicy: Send {
    fn choose(
        &mut self,
        board: &Board,
        role: Option<&GameRole>,
    ) -> MovePayload;
}

/// The stock policy for a game, keyed by name.
pub fn policy_for(game: &GameName) -> Option<Box<dyn MovePolicy>> {
    match game.0.as_str() {
        "TicTacToe" => Some(Box::new(RandomTicTacToe)),
        "ScissorsPaperRock" => Some(Box::new(RandomChooser)),
        "Kalaha" => Some(Box::new(RandomKalaha)),
        _ => None,
    }
}

/// Plays a uniformly random empty square.
struct RandomTicTacToe;

impl MovePolicy for RandomTicTacToe {
    fn choose(
        &mut self,
        board: &Board,
        _role: Option<&GameRole>,
    ) -> MovePayload {
        let mut open = Vec::new();
        if let Some(grid) = board["grid"].as_array() {
            for (row, cells) in grid.iter().enumerate() {
                if let Some(cells) = cells.as_array() {
                    for (col, cell) in cells.iter().enumerate() {
                        if cell.is_null() {
                            open.push(json!({"row": row, "col": col}));
                        }
                    }
                }
            }
        }
        open.choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| json!({"row": 0, "col": 0}))
    }
}

/// Throws scissors, paper, or rock at random.
struct RandomChooser;

impl MovePolicy for RandomChooser {
    fn choose(
        &mut self,
        _board: &Board,
        _role: Option<&GameRole>,
    ) -> MovePayload {
        let choice = ["scissors", "paper", "rock"]
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or("rock");
        json!({ "move": choice })
    }
}

/// Sows from a uniformly random non-empty own pit.
struct RandomKalaha;

impl MovePolicy for RandomKalaha {
    fn choose(
        &mut self,
        board: &Board,
        role: Option<&GameRole>,
    ) -> MovePayload {
        let side = role.map(|r| r.0.as_str()).unwrap_or("a");
        let mut legal = Vec::new();
        if let Some(pits) = board[format!("pits_{side}")].as_array() {
            for (pit, stones) in pits.iter().enumerate() {
                if stones.as_u64().unwrap_or(0) > 0 {
                    legal.push(json!({"move": pit}));
                }
            }
        }
        legal
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_else(|| json!({"move": 0}))
    }
}
