//! The room orchestrator.
//!
//! The broker is the sole arbiter of room and player state, and the central
//! relay between engine connections and agent connections. Callers are
//! authenticated at connect time; every event they send afterwards either
//! succeeds or comes back as an addressed `fail` — a protocol error is
//! never fatal to a connection, and no event is silently dropped.
//!
//! # Key types
//!
//! - [`Broker`] — accept loop plus one dispatch task per connection
//! - [`CredentialVerifier`] / [`KeyVerifier`] — identity at connect time
//! - [`BrokerError`] — everything a handler can fail with, mapped onto the
//!   wire taxonomy

mod auth;
mod error;
mod handler;
mod server;

pub use auth::{AuthError, CredentialVerifier, KeyVerifier, Principal};
pub use error::BrokerError;
pub use server::{Broker, OPERATOR_MARKER};
