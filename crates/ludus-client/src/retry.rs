//! Bounded connection retry.

use std::time::Duration;

use ludus_protocol::Event;
use ludus_transport::{ClientConn, ConnectInfo, Hub, TransportError};

/// Connects to the hub, retrying a bounded number of times with a fixed
/// pause. After the last attempt the transport error propagates; deciding
/// to exit the process is the caller's business.
pub async fn connect_with_retry(
    hub: &Hub<Event>,
    info: ConnectInfo,
    attempts: u32,
    backoff: Duration,
) -> Result<ClientConn<Event>, TransportError> {
    let mut last = TransportError::HubClosed;
    for attempt in 1..=attempts.max(1) {
        match hub.connect(info.clone()).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                tracing::warn!(
                    attempt,
                    attempts,
                    error = %e,
                    "connection failed, waiting"
                );
                last = e;
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    Err(last)
}
