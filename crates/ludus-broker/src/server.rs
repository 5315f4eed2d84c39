//! The broker's accept loop and per-connection dispatch tasks.

use std::sync::Arc;

use ludus_protocol::{BotId, Event};
use ludus_store::{PlayerQueueEntry, Store};
use ludus_transport::{
    ConnectionId, Hub, Listener, Pending, ServerConn,
};
use ludus_tournament::TournamentError;

use crate::auth::{CredentialVerifier, Principal};
use crate::handler;

/// The credential an engine connection presents as its operator marker.
pub const OPERATOR_MARKER: &str = "gameserver";

/// Shared state handed to every connection task.
pub(crate) struct BrokerState<V: CredentialVerifier> {
    pub(crate) hub: Hub<Event>,
    pub(crate) store: Arc<Store>,
    pub(crate) verifier: V,
}

/// The room orchestrator. One task per connection; all room mutation goes
/// through the store's per-room locks.
pub struct Broker<V: CredentialVerifier> {
    state: Arc<BrokerState<V>>,
    listener: Listener<Event>,
}

impl<V: CredentialVerifier> Broker<V> {
    pub fn new(
        hub: Hub<Event>,
        listener: Listener<Event>,
        store: Arc<Store>,
        verifier: V,
    ) -> Self {
        Self {
            state: Arc::new(BrokerState {
                hub,
                store,
                verifier,
            }),
            listener,
        }
    }

    /// Runs the accept loop until every hub handle is dropped.
    pub async fn run(mut self) {
        tracing::info!("broker accepting connections");
        while let Some(pending) = self.listener.accept().await {
            let state = Arc::clone(&self.state);
            tokio::spawn(accept_connection(state, pending));
        }
        tracing::info!("broker shut down");
    }
}

/// Verifies a pending connection, registers tournament presence when a
/// tournament key is presented, then runs the dispatch loop.
async fn accept_connection<V: CredentialVerifier>(
    state: Arc<BrokerState<V>>,
    pending: Pending<Event>,
) {
    let conn_id = pending.id();
    let info = pending.info().clone();

    let principal = match state.verifier.verify(&info).await {
        Ok(principal) => principal,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "connection rejected");
            pending.reject(e.to_string());
            return;
        }
    };

    if let (Principal::Agent { bot }, Some(key)) =
        (&principal, &info.tournament_key)
    {
        if let Err(reason) =
            tournament_presence(&state, conn_id, bot, key).await
        {
            tracing::info!(%conn_id, reason, "tournament presence refused");
            pending.reject(reason);
            return;
        }
    }

    let conn = pending.accept();
    tracing::info!(%conn_id, kind = %info.kind, "connection established");
    handle_connection(state, conn, principal).await;
}

/// Dispatches events for one connection until it closes. Every event
/// either succeeds (acknowledged when asked) or produces an addressed
/// `fail` back to this sender.
async fn handle_connection<V: CredentialVerifier>(
    state: Arc<BrokerState<V>>,
    mut conn: ServerConn<Event>,
    principal: Principal,
) {
    let conn_id = conn.id();
    while let Some(mut delivery) = conn.recv().await {
        tracing::debug!(%conn_id, event = delivery.msg.name(), "event received");
        match handler::handle_event(&state, conn_id, &principal, &delivery.msg)
            .await
        {
            Ok(()) => delivery.ack_ok(),
            Err(err) => {
                tracing::warn!(
                    %conn_id,
                    event = delivery.msg.name(),
                    error = %err,
                    "event failed"
                );
                let fail = err.as_fail(delivery.msg.name());
                // Resolve the sender's ack future when one was requested,
                // otherwise address the fail to the sender's own channel.
                if let Some(fail) = delivery.ack_fail(fail) {
                    if let Err(e) = state.hub.unicast(conn_id, fail) {
                        tracing::debug!(%conn_id, error = %e, "sender gone");
                    }
                }
            }
        }
    }

    tracing::info!(%conn_id, "connection closed");
    state.store.remove_queue_entries(conn_id).await;
}

/// Puts an agent connection into a tournament's player queue for the life
/// of the connection, enrolling the bot on first contact.
async fn tournament_presence<V: CredentialVerifier>(
    state: &Arc<BrokerState<V>>,
    conn: ConnectionId,
    bot: &BotId,
    key: &str,
) -> Result<(), String> {
    let cell = state
        .store
        .tournament_by_key(key)
        .ok_or_else(|| "unknown tournament api key".to_string())?;

    let (tournament_id, existing) = {
        let record = cell.lock().await.map_err(|e| e.to_string())?;
        (record.id.clone(), record.participant_for_bot(bot).cloned())
    };

    let participant = match existing {
        Some(participant) => participant,
        None => match ludus_tournament::add_player(
            &state.store,
            bot,
            &tournament_id,
        )
        .await
        {
            Ok(participant) => participant,
            Err(TournamentError::AlreadyInTournament) => {
                // Lost an enrollment race against another connection of
                // the same bot; its participant exists now.
                let record = cell.lock().await.map_err(|e| e.to_string())?;
                record
                    .participant_for_bot(bot)
                    .cloned()
                    .ok_or_else(|| "enrollment conflict".to_string())?
            }
            Err(e) => return Err(e.to_string()),
        },
    };

    {
        let mut record = cell.lock().await.map_err(|e| e.to_string())?;
        record.queue.push(PlayerQueueEntry {
            tournament: tournament_id.clone(),
            conn,
            participant: participant.id.clone(),
        });
    }
    state
        .hub
        .join_group(&format!("queue:{}", tournament_id.as_str()), conn);
    tracing::info!(
        %conn,
        tournament = %tournament_id,
        participant = %participant.id,
        "participant online"
    );
    Ok(())
}
