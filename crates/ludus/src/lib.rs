//! Ludus: a multiplayer game arena.
//!
//! Independent game-engine processes register playable rooms, independent
//! agent processes join and play them, and a central broker relays typed
//! events between the two, tracks authoritative room state, and runs
//! tournament matchmaking.
//!
//! This meta crate re-exports the individual layers and offers a
//! [`prelude`] for the common wiring:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ludus::prelude::*;
//!
//! # async fn example() -> Result<(), LudusError> {
//! let (hub, listener) = Hub::channel();
//! let store = Arc::new(Store::default());
//! let verifier = KeyVerifier::new(Arc::clone(&store), OPERATOR_MARKER);
//! let broker = Broker::new(hub.clone(), listener, store, verifier);
//! tokio::spawn(broker.run());
//!
//! let host = EngineHost::connect(
//!     &hub,
//!     HostConfig::new(GameName::from("Kalaha")),
//! )
//! .await?;
//! tokio::spawn(host.run());
//! # Ok(())
//! # }
//! ```

mod error;

pub use error::LudusError;

pub use ludus_broker as broker;
pub use ludus_client as client;
pub use ludus_games as games;
pub use ludus_protocol as protocol;
pub use ludus_store as store;
pub use ludus_tournament as tournament;
pub use ludus_transport as transport;

/// The types most programs need.
pub mod prelude {
    pub use crate::LudusError;
    pub use ludus_broker::{
        Broker, CredentialVerifier, KeyVerifier, Principal, OPERATOR_MARKER,
    };
    pub use ludus_client::{
        AgentConfig, AgentRunner, EngineHost, HostConfig,
    };
    pub use ludus_games::{create_table, GameRules, MoveOutcome, Table};
    pub use ludus_protocol::{
        ErrorKind, Event, Finish, GameName, GameRole, PlayerId, RoomId,
        RoomStatus, Visibility,
    };
    pub use ludus_store::Store;
    pub use ludus_tournament::{add_player, pick_match};
    pub use ludus_transport::{ClientConn, ConnectInfo, Hub};
}
