//! Unified error type for the Ludus meta crate.

use ludus_broker::BrokerError;
use ludus_client::ClientError;
use ludus_games::RulesError;
use ludus_store::StoreError;
use ludus_tournament::TournamentError;
use ludus_transport::TransportError;

/// Top-level error wrapping every layer's error type, so programs built
/// on the meta crate can use `?` across layers.
#[derive(Debug, thiserror::Error)]
pub enum LudusError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Rules(#[from] RulesError),

    #[error(transparent)]
    Tournament(#[from] TournamentError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: LudusError = TransportError::ConnectionClosed.into();
        assert!(matches!(err, LudusError::Transport(_)));
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn test_from_rules_error() {
        let err: LudusError = RulesError::NotPlayersTurn.into();
        assert!(matches!(err, LudusError::Rules(_)));
    }

    #[test]
    fn test_from_client_error() {
        let err: LudusError =
            ClientError::OwnFault("illegal move".into()).into();
        assert!(matches!(err, LudusError::Client(_)));
    }
}
