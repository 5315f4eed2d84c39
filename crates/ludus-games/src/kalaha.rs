//! Kalaha: a sowing/capture board game on two rows of six pits.
//!
//! Layout is a flat ring of 14 slots: pits 0–5 and store 6 belong to role
//! `a`, pits 7–12 and store 13 to role `b`. Sowing walks the ring, skipping
//! the opponent's store.

use ludus_protocol::{Board, GameRole, MovePayload};
use rand::seq::IndexedRandom;
use serde::Deserialize;
use serde_json::json;

use crate::table::{GameRules, RulesError, Seats, Step};

pub(crate) const NAME: &str = "Kalaha";

const ROLE_A: &str = "a";
const ROLE_B: &str = "b";

const PITS: usize = 6;
const SLOTS: usize = 14;
const BANK_A: usize = 6;
const BANK_B: usize = 13;

/// Stones per pit at the start.
const SEED: u32 = 6;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PitMove {
    #[serde(rename = "move")]
    pit: usize,
}

/// Kalaha on the classic (6, 6) board.
#[derive(Debug)]
pub struct Kalaha {
    slots: [u32; SLOTS],
    winner: Option<GameRole>,
}

impl Default for Kalaha {
    fn default() -> Self {
        Self {
            slots: [0; SLOTS],
            winner: None,
        }
    }
}

impl Kalaha {
    pub fn new() -> Self {
        Self::default()
    }

    fn pits(&self, offset: usize) -> &[u32] {
        &self.slots[offset..offset + PITS]
    }

    fn row_sum(&self, offset: usize) -> u32 {
        self.pits(offset).iter().sum()
    }

    /// Sweeps both rows into their stores and decides the winner.
    fn finish(&mut self) {
        self.slots[BANK_A] += self.row_sum(0);
        self.slots[BANK_B] += self.row_sum(7);
        for pit in 0..PITS {
            self.slots[pit] = 0;
            self.slots[7 + pit] = 0;
        }
        self.winner = match self.slots[BANK_A].cmp(&self.slots[BANK_B]) {
            std::cmp::Ordering::Greater => Some(GameRole::from(ROLE_A)),
            std::cmp::Ordering::Less => Some(GameRole::from(ROLE_B)),
            std::cmp::Ordering::Equal => None,
        };
    }
}

impl GameRules for Kalaha {
    fn name(&self) -> &'static str {
        NAME
    }

    fn assign_role(&mut self, seats: &Seats) -> Option<GameRole> {
        let available: Vec<&str> = [ROLE_A, ROLE_B]
            .into_iter()
            .filter(|r| !seats.role_taken(&GameRole::from(*r)))
            .collect();
        available
            .choose(&mut rand::rng())
            .map(|r| GameRole::from(*r))
    }

    fn first_turn(&self) -> Option<GameRole> {
        Some(GameRole::from(ROLE_A))
    }

    fn init(&mut self) {
        self.slots = [SEED; SLOTS];
        self.slots[BANK_A] = 0;
        self.slots[BANK_B] = 0;
        self.winner = None;
    }

    fn parse_move(&self, raw: &MovePayload) -> Result<(), String> {
        let mv: PitMove = serde_json::from_value(raw.clone())
            .map_err(|e| e.to_string())?;
        if mv.pit >= PITS {
            return Err("pit must be between 0 and 5".into());
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
        let mv: PitMove = serde_json::from_value(raw.clone())
            .map_err(|e| RulesError::IllegalMove(e.to_string()))?;

        let mine_a = role.0 == ROLE_A;
        let (offset, own_bank, opp_bank, other_offset) = if mine_a {
            (0, BANK_A, BANK_B, 7)
        } else {
            (7, BANK_B, BANK_A, 0)
        };

        let pos = offset + mv.pit;
        let mut stones = self.slots[pos];
        if stones == 0 {
            return Err(RulesError::IllegalMove("empty pit chosen".into()));
        }
        self.slots[pos] = 0;

        // Sow one stone per slot around the ring, skipping the opponent's
        // store.
        let mut cur = pos;
        while stones > 0 {
            cur = (cur + 1) % SLOTS;
            if cur == opp_bank {
                continue;
            }
            self.slots[cur] += 1;
            stones -= 1;
        }

        // Last stone into an empty pit on the mover's own row captures that
        // pit plus the directly-opposite pit — if the opposite holds stones.
        let own_row = cur >= offset && cur < offset + PITS;
        if own_row && self.slots[cur] == 1 {
            let opposite = other_offset + (PITS - 1 - (cur - offset));
            if self.slots[opposite] > 0 {
                self.slots[own_bank] += self.slots[opposite] + 1;
                self.slots[opposite] = 0;
                self.slots[cur] = 0;
            }
        }

        // Last stone into the mover's own store grants another turn.
        let next = if cur == own_bank {
            role.clone()
        } else {
            GameRole::from(if mine_a { ROLE_B } else { ROLE_A })
        };

        if self.row_sum(0) == 0 || self.row_sum(7) == 0 {
            self.finish();
            return Ok(Step {
                next: None,
                over: true,
            });
        }
        Ok(Step {
            next: Some(next),
            over: false,
        })
    }

    fn winner(&self) -> Option<GameRole> {
        self.winner.clone()
    }

    fn board(&self) -> Board {
        json!({
            "pits_a": self.pits(0),
            "bank_a": self.slots[BANK_A],
            "pits_b": self.pits(7),
            "bank_b": self.slots[BANK_B],
        })
    }
}
