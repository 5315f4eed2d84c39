//! Identity at connect time.
//!
//! The broker does not mint credentials; it consumes them. An engine
//! connection presents the operator marker, an agent connection presents a
//! bot api key, and anonymous callers are rejected before they can send a
//! single event. The [`CredentialVerifier`] trait keeps the actual
//! verification swappable (the in-repo [`KeyVerifier`] resolves keys
//! through the store; a deployment can substitute its own).

use std::sync::Arc;

use ludus_protocol::BotId;
use ludus_store::Store;
use ludus_transport::{ConnectInfo, PeerKind};

/// Who a verified connection is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A game-engine process (operator scope).
    Engine,
    /// An agent process acting for one bot.
    Agent { bot: BotId },
}

/// Why a credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credential")]
    Invalid,
    #[error("expired credential")]
    Expired,
}

/// Validates connect-time credentials and yields the caller's principal.
pub trait CredentialVerifier: Send + Sync + 'static {
    /// Verifies the presented identity material.
    fn verify(
        &self,
        info: &ConnectInfo,
    ) -> impl std::future::Future<Output = Result<Principal, AuthError>> + Send;
}

/// The stock verifier: operator marker for engines, store-issued bot api
/// keys for agents.
pub struct KeyVerifier {
    store: Arc<Store>,
    operator_marker: String,
}

impl KeyVerifier {
    pub fn new(store: Arc<Store>, operator_marker: impl Into<String>) -> Self {
        Self {
            store,
            operator_marker: operator_marker.into(),
        }
    }
}

impl CredentialVerifier for KeyVerifier {
    async fn verify(
        &self,
        info: &ConnectInfo,
    ) -> Result<Principal, AuthError> {
        // Anonymous callers are rejected regardless of peer kind.
        let credential =
            info.credential.as_deref().ok_or(AuthError::Invalid)?;
        match info.kind {
            PeerKind::Engine => {
                if credential == self.operator_marker {
                    Ok(Principal::Engine)
                } else {
                    Err(AuthError::Invalid)
                }
            }
            PeerKind::Agent => self
                .store
                .bot_by_key(credential)
                .map(|bot| Principal::Agent { bot: bot.id })
                .ok_or(AuthError::Invalid),
        }
    }
}
