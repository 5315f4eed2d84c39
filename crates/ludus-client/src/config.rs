//! Client configuration.

use std::time::Duration;

use ludus_protocol::GameName;

/// Settings for an [`EngineHost`](crate::EngineHost).
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Which game this host runs.
    pub game: GameName,
    /// Display name announced for each room.
    pub lobby_name: String,
    /// Operator marker presented at connect time.
    pub credential: String,
    /// Quit after one game instead of recycling into a new lobby.
    pub run_once: bool,
    /// Connection attempts before giving up.
    pub retries: u32,
    /// Fixed pause between connection attempts.
    pub retry_backoff: Duration,
}

impl HostConfig {
    pub fn new(game: GameName) -> Self {
        Self {
            game,
            lobby_name: "Some lobby".to_string(),
            credential: "gameserver".to_string(),
            run_once: false,
            retries: 5,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// Settings for an [`AgentRunner`](crate::AgentRunner).
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// The bot api key presented at connect time.
    pub api_key: String,
    /// Optional tournament api key; enrolls the connection in that
    /// tournament's player queue.
    pub tournament_key: Option<String>,
    /// Display name used when joining rooms.
    pub player_name: String,
    /// Quit after one game instead of looking for the next lobby.
    pub run_once: bool,
    /// Keep playing new games even after an abnormal finish that was our
    /// own fault.
    pub persist_after_fault: bool,
    /// How long to wait before asking for the lobby list again when no
    /// room is open.
    pub relist_delay: Duration,
    /// Connection attempts before giving up.
    pub retries: u32,
    /// Fixed pause between connection attempts.
    pub retry_backoff: Duration,
}

impl AgentConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            tournament_key: None,
            player_name: "Some Player".to_string(),
            run_once: false,
            persist_after_fault: false,
            relist_delay: Duration::from_secs(10),
            retries: 5,
            retry_backoff: Duration::from_secs(5),
        }
    }
}
