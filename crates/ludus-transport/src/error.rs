//! Error types for the channel layer.

use crate::ConnectionId;

/// Errors that can occur on the event channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The hub refused the connection (failed credential verification).
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// The far end of this connection is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// No connection with this id is registered.
    #[error("{0} is not connected")]
    NotConnected(ConnectionId),

    /// The hub's accept side has been dropped.
    #[error("hub is no longer accepting connections")]
    HubClosed,
}
