//! Scissors / paper / rock: a simultaneous two-choice duel.
//!
//! Both players pick once per round. The first pick is stored hidden; the
//! second pick resolves the round. A tie restarts the round without
//! completing the game.

use ludus_protocol::{Board, GameRole, MovePayload};
use serde::Deserialize;
use serde_json::json;

use crate::table::{GameRules, RulesError, Seats, Step};

pub(crate) const NAME: &str = "ScissorsPaperRock";

const ROLE_A: &str = "a";
const ROLE_B: &str = "b";

const CHOICES: [&str; 3] = ["scissors", "paper", "rock"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChoiceMove {
    #[serde(rename = "move")]
    choice: String,
}

/// Each choice beats exactly one other: scissors → paper → rock → scissors.
fn rank(choice: &str) -> u8 {
    match choice {
        "scissors" => 0,
        "paper" => 1,
        _ => 2,
    }
}

/// Scissors beats paper, paper beats rock, rock beats scissors.
#[derive(Debug, Default)]
pub struct ScissorsPaperRock {
    first: Option<String>,
    second: Option<String>,
    winner: Option<GameRole>,
    settled: bool,
}

impl ScissorsPaperRock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameRules for ScissorsPaperRock {
    fn name(&self) -> &'static str {
        NAME
    }

    fn assign_role(&mut self, seats: &Seats) -> Option<GameRole> {
        if seats.role_taken(&GameRole::from(ROLE_A)) {
            Some(GameRole::from(ROLE_B))
        } else {
            Some(GameRole::from(ROLE_A))
        }
    }

    fn first_turn(&self) -> Option<GameRole> {
        Some(GameRole::from(ROLE_A))
    }

    fn init(&mut self) {
        self.first = None;
        self.second = None;
        self.winner = None;
        self.settled = false;
    }

    fn parse_move(&self, raw: &MovePayload) -> Result<(), String> {
        let mv: ChoiceMove = serde_json::from_value(raw.clone())
            .map_err(|e| e.to_string())?;
        if !CHOICES.contains(&mv.choice.as_str()) {
            return Err(format!(
                "choice must be one of scissors, paper, rock; got {:?}",
                mv.choice
            ));
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
        let mv: ChoiceMove = serde_json::from_value(raw.clone())
            .map_err(|e| RulesError::IllegalMove(e.to_string()))?;

        if role.0 == ROLE_A {
            self.first = Some(mv.choice);
            return Ok(Step {
                next: Some(GameRole::from(ROLE_B)),
                over: false,
            });
        }

        let first = self.first.clone().ok_or_else(|| {
            RulesError::IllegalMove("no opening choice to answer".into())
        })?;
        if mv.choice == first {
            // Tied round: wipe both picks and go again.
            self.first = None;
            self.second = None;
            return Ok(Step {
                next: Some(GameRole::from(ROLE_A)),
                over: false,
            });
        }

        let winner = if rank(&mv.choice) == (rank(&first) + 1) % 3 {
            ROLE_A
        } else {
            ROLE_B
        };
        self.second = Some(mv.choice);
        self.winner = Some(GameRole::from(winner));
        self.settled = true;
        Ok(Step {
            next: None,
            over: true,
        })
    }

    fn winner(&self) -> Option<GameRole> {
        self.winner.clone()
    }

    /// Picks stay hidden until the duel settles.
    fn board(&self) -> Board {
        if self.settled {
            json!({ "choices": { "a": self.first, "b": self.second } })
        } else {
            json!({ "choices": { "a": null, "b": null } })
        }
    }
}
