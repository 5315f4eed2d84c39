//! Game rule engines.
//!
//! Every game the arena can host implements the [`GameRules`] trait; the
//! [`Table`] wrapper owns one rules box plus the seating/turn state every
//! game shares, and enforces the universal move preconditions before
//! delegating. Engines are selected from a name-keyed registry
//! ([`create_table`]).
//!
//! A finishing move is reported as [`MoveOutcome::Completed`] — a control
//! outcome, not an error. Only genuinely faulty behavior (wrong turn,
//! malformed move, occupied square, …) surfaces as [`RulesError`].

mod kalaha;
mod spr;
mod table;
mod tictactoe;

pub use kalaha::Kalaha;
pub use spr::ScissorsPaperRock;
pub use table::{GameRules, MoveOutcome, RulesError, Seats, Step, Table};
pub use tictactoe::TicTacToe;

use ludus_protocol::GameName;

/// Builds a fresh table for the named game, or `None` for an unknown game.
pub fn create_table(game: &GameName) -> Option<Table> {
    let rules: Box<dyn GameRules> = match game.0.as_str() {
        tictactoe::NAME => Box::new(TicTacToe::new()),
        spr::NAME => Box::new(ScissorsPaperRock::new()),
        kalaha::NAME => Box::new(Kalaha::new()),
        _ => return None,
    };
    Some(Table::new(rules))
}

/// The names of every game this crate knows how to host.
pub fn catalog() -> &'static [&'static str] {
    &[tictactoe::NAME, spr::NAME, kalaha::NAME]
}
