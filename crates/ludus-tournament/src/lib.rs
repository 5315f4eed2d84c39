//! Tournament matchmaking.
//!
//! Two operations, both serialized under the tournament's timed lock:
//!
//! - [`add_player`] enrolls a bot and creates one pending match against
//!   every existing non-disqualified participant, so the match set grows
//!   into the complete round-robin graph as participants trickle in.
//! - [`pick_match`] selects the lowest-index pending match whose two
//!   participants are both online right now. Lowest index first means
//!   earlier-joined pairings are served before newer ones.
//!
//! Match indices are derived deterministically from both participants'
//! indices (`100_000 * joiner + opponent`); a joiner's index strictly
//! exceeds every earlier one, so the same unordered pair can never be
//! produced twice and matches order globally.

use std::collections::HashSet;

use ludus_protocol::{BotId, ErrorKind, MatchId, ParticipantId, TournamentId};
use ludus_store::{Match, MatchState, Participant, Store, StoreError};

/// Spread factor between joiner and opponent indices in a match index.
const INDEX_STRIDE: u64 = 100_000;

/// Failures of the matchmaking operations.
#[derive(Debug, thiserror::Error)]
pub enum TournamentError {
    #[error("the bot already has a participant in this tournament")]
    AlreadyInTournament,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TournamentError {
    /// The wire error kind a failure reply should carry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyInTournament => ErrorKind::AlreadyInTournament,
            Self::Store(e) => e.kind(),
        }
    }
}

/// Enrolls a bot in a tournament.
///
/// Under the tournament's lock: rejects a second enrollment of the same
/// bot, allocates the next participant index, and creates one pending
/// match against every existing non-disqualified participant.
pub async fn add_player(
    store: &Store,
    bot: &BotId,
    tournament: &TournamentId,
) -> Result<Participant, TournamentError> {
    let cell = store.tournament(tournament)?;
    let mut record = cell.lock().await?;
    tracing::debug!(%tournament, %bot, "holding tournament lock for enrollment");

    if record.participant_for_bot(bot).is_some() {
        return Err(TournamentError::AlreadyInTournament);
    }

    let index = record
        .participants
        .iter()
        .map(|p| p.index)
        .max()
        .map_or(1, |max| max + 1);
    let participant = Participant {
        id: ParticipantId::fresh(),
        index,
        bot: bot.clone(),
        disqualified: false,
    };

    let opponents: Vec<_> = record
        .participants
        .iter()
        .filter(|p| !p.disqualified)
        .cloned()
        .collect();
    for opponent in opponents {
        record.matches.push(Match {
            id: MatchId::fresh(),
            index: INDEX_STRIDE * u64::from(index) + u64::from(opponent.index),
            state: MatchState::Pending,
            players: [participant.id.clone(), opponent.id.clone()],
            room: None,
        });
    }

    tracing::info!(
        %tournament,
        %bot,
        index,
        matches = record.matches.len(),
        "participant enrolled"
    );
    record.participants.push(participant.clone());
    Ok(participant)
}

/// Picks the next match to run.
///
/// Under the tournament's lock: builds the online set from live queue
/// entries, selects pending matches with both players online, and returns
/// the lowest-index one marked `Running`. `Ok(None)` means nothing is
/// eligible right now — the caller retries later.
pub async fn pick_match(
    store: &Store,
    tournament: &TournamentId,
) -> Result<Option<Match>, TournamentError> {
    let cell = store.tournament(tournament)?;
    let mut record = cell.lock().await?;

    let online: HashSet<ParticipantId> = record
        .queue
        .iter()
        .map(|entry| entry.participant.clone())
        .collect();

    let picked = record
        .matches
        .iter_mut()
        .filter(|m| {
            m.state == MatchState::Pending
                && m.players.iter().all(|p| online.contains(p))
        })
        .min_by_key(|m| m.index);

    match picked {
        Some(m) => {
            m.state = MatchState::Running;
            tracing::info!(%tournament, match_id = %m.id, "match picked");
            Ok(Some(m.clone()))
        }
        None => Ok(None),
    }
}
