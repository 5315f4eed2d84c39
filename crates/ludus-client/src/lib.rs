//! Client state machines: the two processes on the far side of the broker.
//!
//! - [`EngineHost`] hosts authoritative game rules for one room at a time:
//!   `connecting → lobby → starting → playing → finished`, recycling into a
//!   fresh lobby unless configured single-shot.
//! - [`AgentRunner`] plays games: `connecting → listing → joining →
//!   playing → finished`, picking moves through a [`MovePolicy`].
//!
//! Both connect through [`connect_with_retry`]: a bounded attempt count
//! with a fixed backoff, after which the transport error propagates.

mod agent;
mod config;
mod engine_host;
mod policy;
mod retry;

pub use agent::AgentRunner;
pub use config::{AgentConfig, HostConfig};
pub use engine_host::EngineHost;
pub use policy::{policy_for, MovePolicy};
pub use retry::connect_with_retry;

use ludus_protocol::GameName;
use ludus_transport::TransportError;

/// Failures of the client state machines.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No rule engine or move policy is registered for this game.
    #[error("unknown game {0}")]
    UnknownGame(GameName),

    /// The agent itself caused an abnormal finish and is not configured
    /// to keep playing past its own faults.
    #[error("game finished abnormally at our fault: {0}")]
    OwnFault(String),
}
