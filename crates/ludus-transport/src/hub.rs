//! The in-process switchboard.
//!
//! One [`Hub`] stands in for the socket layer: clients connect to it, the
//! broker accepts (or rejects) them off a [`Listener`], and from then on
//! each side sends typed messages that arrive FIFO at the other end.
//!
//! Acknowledgements are a response channel passed alongside the outbound
//! message: `send_acked` embeds a oneshot in the [`Delivery`], and the
//! returned [`AckFuture`] resolves once the receiver answers (or drops the
//! connection). A remote `fail` reply resolves the future to that event,
//! so a fire-and-forget send doubles as a request/acknowledgement primitive.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use crate::{ConnectInfo, ConnectionId, TransportError};

/// One received message, plus the responder when the sender asked for an
/// acknowledgement.
#[derive(Debug)]
pub struct Delivery<M> {
    pub msg: M,
    pub responder: Option<Responder<M>>,
}

impl<M> Delivery<M> {
    /// Confirms delivery to the sender, if an acknowledgement was requested.
    pub fn ack_ok(&mut self) {
        if let Some(responder) = self.responder.take() {
            responder.ok();
        }
    }

    /// Answers the sender with a failure event, if an acknowledgement was
    /// requested. Returns the event back when nobody asked for one.
    pub fn ack_fail(&mut self, failure: M) -> Option<M> {
        match self.responder.take() {
            Some(responder) => {
                responder.fail(failure);
                None
            }
            None => Some(failure),
        }
    }
}

/// The answering half of an acknowledgement.
#[derive(Debug)]
pub struct Responder<M>(oneshot::Sender<Result<(), M>>);

impl<M> Responder<M> {
    /// Resolves the sender's [`AckFuture`] with success.
    pub fn ok(self) {
        let _ = self.0.send(Ok(()));
    }

    /// Resolves the sender's [`AckFuture`] with the given failure event.
    pub fn fail(self, failure: M) {
        let _ = self.0.send(Err(failure));
    }
}

/// How an acknowledged send can fail.
#[derive(Debug, PartialEq)]
pub enum AckError<M> {
    /// The remote side answered with a failure event.
    Failed(M),
    /// The connection went away before the acknowledgement arrived.
    ConnectionLost,
}

/// Resolves once the remote side has acknowledged (or failed) a send.
#[derive(Debug)]
pub struct AckFuture<M>(oneshot::Receiver<Result<(), M>>);

impl<M> AckFuture<M> {
    /// Waits for the acknowledgement.
    pub async fn wait(self) -> Result<(), AckError<M>> {
        match self.0.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(failure)) => Err(AckError::Failed(failure)),
            Err(_) => Err(AckError::ConnectionLost),
        }
    }
}

// ---------------------------------------------------------------------------
// Hub internals
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ConnEntry<M> {
    /// Server → client deliveries.
    to_client: mpsc::UnboundedSender<Delivery<M>>,
}

#[derive(Debug)]
struct HubState<M> {
    conns: HashMap<ConnectionId, ConnEntry<M>>,
    groups: HashMap<String, HashSet<ConnectionId>>,
}

#[derive(Debug)]
struct Inner<M> {
    state: Mutex<HubState<M>>,
    accept_tx: mpsc::UnboundedSender<Pending<M>>,
    next_conn: AtomicU64,
}

impl<M> Inner<M> {
    fn remove(&self, id: ConnectionId) {
        let mut state = self.state.lock().expect("hub state poisoned");
        if state.conns.remove(&id).is_some() {
            tracing::debug!(%id, "connection deregistered");
        }
        for members in state.groups.values_mut() {
            members.remove(&id);
        }
    }
}

/// The switchboard handle. Cheap to clone; the broker keeps one and uses it
/// for all outbound traffic and group management.
pub struct Hub<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Hub<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Accept side of the hub, held by the broker.
pub struct Listener<M> {
    rx: mpsc::UnboundedReceiver<Pending<M>>,
}

impl<M> Listener<M> {
    /// Waits for the next connection attempt. `None` once every hub handle
    /// is gone.
    pub async fn accept(&mut self) -> Option<Pending<M>> {
        self.rx.recv().await
    }
}

/// A connection attempt awaiting the broker's accept/reject decision.
pub struct Pending<M> {
    id: ConnectionId,
    info: ConnectInfo,
    decision: oneshot::Sender<Result<(), String>>,
    server_rx: mpsc::UnboundedReceiver<Delivery<M>>,
    hub: Arc<Inner<M>>,
}

impl<M> Pending<M> {
    /// The connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The identity material the caller presented.
    pub fn info(&self) -> &ConnectInfo {
        &self.info
    }

    /// Accepts the connection, yielding the server-side receive handle.
    pub fn accept(self) -> ServerConn<M> {
        let _ = self.decision.send(Ok(()));
        ServerConn {
            id: self.id,
            info: self.info,
            rx: self.server_rx,
        }
    }

    /// Rejects the connection; the connecting side sees
    /// [`TransportError::Rejected`] with the given reason.
    pub fn reject(self, reason: impl Into<String>) {
        self.hub.remove(self.id);
        let _ = self.decision.send(Err(reason.into()));
    }
}

/// The server-side receive end of one accepted connection.
pub struct ServerConn<M> {
    id: ConnectionId,
    info: ConnectInfo,
    rx: mpsc::UnboundedReceiver<Delivery<M>>,
}

impl<M> ServerConn<M> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn info(&self) -> &ConnectInfo {
        &self.info
    }

    /// Receives the next client message. `None` when the client is gone.
    pub async fn recv(&mut self) -> Option<Delivery<M>> {
        self.rx.recv().await
    }
}

/// The client-side end of one connection.
#[derive(Debug)]
pub struct ClientConn<M> {
    id: ConnectionId,
    to_server: mpsc::UnboundedSender<Delivery<M>>,
    rx: mpsc::UnboundedReceiver<Delivery<M>>,
    hub: Arc<Inner<M>>,
}

impl<M> ClientConn<M> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends a fire-and-forget event to the broker.
    pub fn send(&self, msg: M) -> Result<(), TransportError> {
        self.to_server
            .send(Delivery {
                msg,
                responder: None,
            })
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Sends an event and returns a future resolving on acknowledgement.
    pub fn send_acked(&self, msg: M) -> Result<AckFuture<M>, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.to_server
            .send(Delivery {
                msg,
                responder: Some(Responder(tx)),
            })
            .map_err(|_| TransportError::ConnectionClosed)?;
        Ok(AckFuture(rx))
    }

    /// Receives the next broker event. `None` once disconnected.
    pub async fn recv(&mut self) -> Option<Delivery<M>> {
        self.rx.recv().await
    }
}

impl<M> Drop for ClientConn<M> {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}

// ---------------------------------------------------------------------------
// Hub operations
// ---------------------------------------------------------------------------

impl<M: Send + 'static> Hub<M> {
    /// Creates a hub and its accept listener.
    pub fn channel() -> (Hub<M>, Listener<M>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let hub = Hub {
            inner: Arc::new(Inner {
                state: Mutex::new(HubState {
                    conns: HashMap::new(),
                    groups: HashMap::new(),
                }),
                accept_tx,
                next_conn: AtomicU64::new(1),
            }),
        };
        (hub, Listener { rx: accept_rx })
    }

    /// Connects a new client, waiting for the broker's accept decision.
    pub async fn connect(
        &self,
        info: ConnectInfo,
    ) -> Result<ClientConn<M>, TransportError> {
        let id = ConnectionId::new(
            self.inner.next_conn.fetch_add(1, Ordering::Relaxed),
        );
        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (to_server, server_rx) = mpsc::unbounded_channel();
        let (decision_tx, decision_rx) = oneshot::channel();

        {
            let mut state =
                self.inner.state.lock().expect("hub state poisoned");
            state.conns.insert(id, ConnEntry { to_client });
        }

        tracing::debug!(%id, kind = %info.kind, "connection attempt");
        let pending = Pending {
            id,
            info,
            decision: decision_tx,
            server_rx,
            hub: Arc::clone(&self.inner),
        };
        if self.inner.accept_tx.send(pending).is_err() {
            self.inner.remove(id);
            return Err(TransportError::HubClosed);
        }

        match decision_rx.await {
            Ok(Ok(())) => Ok(ClientConn {
                id,
                to_server,
                rx: client_rx,
                hub: Arc::clone(&self.inner),
            }),
            Ok(Err(reason)) => Err(TransportError::Rejected(reason)),
            Err(_) => {
                self.inner.remove(id);
                Err(TransportError::HubClosed)
            }
        }
    }

    /// Sends a fire-and-forget event to one connection.
    pub fn unicast(
        &self,
        id: ConnectionId,
        msg: M,
    ) -> Result<(), TransportError> {
        let state = self.inner.state.lock().expect("hub state poisoned");
        let entry = state
            .conns
            .get(&id)
            .ok_or(TransportError::NotConnected(id))?;
        entry
            .to_client
            .send(Delivery {
                msg,
                responder: None,
            })
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Sends an event to one connection and returns its acknowledgement
    /// future.
    pub fn unicast_acked(
        &self,
        id: ConnectionId,
        msg: M,
    ) -> Result<AckFuture<M>, TransportError> {
        let (tx, rx) = oneshot::channel();
        let state = self.inner.state.lock().expect("hub state poisoned");
        let entry = state
            .conns
            .get(&id)
            .ok_or(TransportError::NotConnected(id))?;
        entry
            .to_client
            .send(Delivery {
                msg,
                responder: Some(Responder(tx)),
            })
            .map_err(|_| TransportError::ConnectionClosed)?;
        Ok(AckFuture(rx))
    }

    /// Adds a connection to a named broadcast group.
    pub fn join_group(&self, group: &str, id: ConnectionId) {
        let mut state = self.inner.state.lock().expect("hub state poisoned");
        state
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(id);
    }

    /// Removes a connection from a named broadcast group.
    pub fn leave_group(&self, group: &str, id: ConnectionId) {
        let mut state = self.inner.state.lock().expect("hub state poisoned");
        if let Some(members) = state.groups.get_mut(group) {
            members.remove(&id);
        }
    }

    /// Current members of a group (empty if the group does not exist).
    pub fn group_members(&self, group: &str) -> Vec<ConnectionId> {
        let state = self.inner.state.lock().expect("hub state poisoned");
        state
            .groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns `true` while the connection is registered.
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        let state = self.inner.state.lock().expect("hub state poisoned");
        state.conns.contains_key(&id)
    }
}

impl<M: Clone + Send + 'static> Hub<M> {
    /// Delivers an event to every member of a group. Members that vanished
    /// mid-send are skipped.
    pub fn broadcast(&self, group: &str, msg: M) {
        let state = self.inner.state.lock().expect("hub state poisoned");
        let Some(members) = state.groups.get(group) else {
            return;
        };
        for id in members {
            if let Some(entry) = state.conns.get(id) {
                let _ = entry.to_client.send(Delivery {
                    msg: msg.clone(),
                    responder: None,
                });
            }
        }
    }
}
