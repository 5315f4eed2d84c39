//! The event channel the broker assumes.
//!
//! The arena core does not implement a network transport; it requires a
//! reliable, ordered, bidirectional event channel per connection, with named
//! broadcast groups and an optional per-send delivery acknowledgement. This
//! crate pins that contract down and provides the in-process implementation
//! ([`Hub`]) used by tests, demos, and single-process deployments.
//!
//! # Key types
//!
//! - [`Hub`] — the switchboard: connect, unicast, broadcast, groups
//! - [`Listener`] / [`Pending`] — the accept side, with explicit
//!   accept/reject so the broker can verify credentials first
//! - [`ClientConn`] / [`ServerConn`] — the two ends of one connection
//! - [`AckFuture`] — resolves when the remote side confirms delivery, or
//!   with the remote failure event

mod error;
mod hub;

pub use error::TransportError;
pub use hub::{
    AckError, AckFuture, ClientConn, Delivery, Hub, Listener, Pending,
    Responder, ServerConn,
};

use std::fmt;

/// Opaque identifier for one connection to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64`.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What kind of process is on the far end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    /// A process hosting authoritative game rules.
    Engine,
    /// A player (bot) process.
    Agent,
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine => write!(f, "engine"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// Identity material presented at connect time.
///
/// The transport passes this through untouched; the broker's credential
/// verifier decides whether to accept. Anonymous callers (no credential)
/// are rejected there.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub kind: PeerKind,
    /// Operator marker for engines, bot api key for agents.
    pub credential: Option<String>,
    /// Optional tournament api key; presenting one registers the
    /// connection in that tournament's player queue.
    pub tournament_key: Option<String>,
}

impl ConnectInfo {
    /// Connect as a game-engine process.
    pub fn engine(credential: impl Into<String>) -> Self {
        Self {
            kind: PeerKind::Engine,
            credential: Some(credential.into()),
            tournament_key: None,
        }
    }

    /// Connect as an agent process.
    pub fn agent(api_key: impl Into<String>) -> Self {
        Self {
            kind: PeerKind::Agent,
            credential: Some(api_key.into()),
            tournament_key: None,
        }
    }

    /// Attach a tournament api key.
    pub fn with_tournament(mut self, key: impl Into<String>) -> Self {
        self.tournament_key = Some(key.into());
        self
    }
}
