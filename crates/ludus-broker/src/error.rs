//! The broker's handler error type.

use ludus_protocol::{ErrorKind, Event};
use ludus_store::StoreError;

/// Everything an event handler can fail with. Every variant maps onto one
/// [`ErrorKind`], which is what the addressed `fail` event carries.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// A taxonomy failure with its stock details.
    #[error("{0}")]
    Kind(#[from] ErrorKind),

    /// A taxonomy failure with a specific human-readable detail
    /// (validation failures mostly).
    #[error("{kind}: {details}")]
    Detailed { kind: ErrorKind, details: String },

    /// A store failure (not found, uniqueness, lock contention).
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BrokerError {
    /// A validation short-circuit: no state has been touched.
    pub fn validation(details: impl Into<String>) -> Self {
        Self::Detailed {
            kind: ErrorKind::InputValidationError,
            details: details.into(),
        }
    }

    /// The wire error kind for the `fail` reply.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Kind(kind) => *kind,
            Self::Detailed { kind, .. } => *kind,
            Self::Store(e) => e.kind(),
        }
    }

    /// The human-readable detail for the `fail` reply.
    pub fn details(&self) -> String {
        match self {
            Self::Kind(kind) => kind.to_string(),
            Self::Detailed { details, .. } => details.clone(),
            Self::Store(e) => e.to_string(),
        }
    }

    /// Builds the `fail` event answering `responding_to`.
    pub fn as_fail(&self, responding_to: &str) -> Event {
        Event::Fail {
            error: self.kind().wire_name().to_string(),
            details: self.details(),
            responding_to: responding_to.to_string(),
        }
    }
}
