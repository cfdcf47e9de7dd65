//! WebSocket session loop — runs one upgraded socket from connect through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use paircam_core::{ClientEvent, ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};
use crate::relay::Relay;

use super::connection::RelayConnection;
use super::table::ConnectionTable;

/// Outbound channel depth per connection. Image frames are large but few;
/// a slow reader sheds frames rather than stalling its peer.
const SEND_QUEUE_DEPTH: usize = 256;

/// Run a WebSocket session for one connected client.
///
/// 1. Registers the connection in the table
/// 2. Forwards queued server events and sends periodic Ping frames
/// 3. Parses inbound text (or UTF-8 binary) frames as client events and
///    dispatches them through the relay
/// 4. On disconnect, releases any pairing binding the connection held
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_relay_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    relay: Arc<Relay>,
    table: Arc<ConnectionTable>,
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_DEPTH);
    let connection = Arc::new(RelayConnection::new(conn_id.clone(), send_tx));

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    table.insert(Arc::clone(&connection));

    // Outbound forwarder with heartbeat pings.
    let outbound_conn = Arc::clone(&connection);
    let outbound_shutdown = shutdown.clone();
    let outbound = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(heartbeat_interval);
        // Skip the immediate first tick
        let _ = ping_interval.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > heartbeat_timeout
                    {
                        warn!("client unresponsive for {heartbeat_timeout:?}, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
                () = outbound_shutdown.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Inbound loop.
    loop {
        let msg = tokio::select! {
            msg = ws_rx.next() => msg,
            () = shutdown.cancelled() => {
                debug!("server shutting down, closing session");
                break;
            }
        };
        let Some(Ok(msg)) = msg else { break };

        // Accept text and UTF-8 binary frames interchangeably
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_string()),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };
        let Some(text) = text else { continue };
        connection.mark_alive();

        let reply = match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => relay.handle_event(&conn_id, event),
            Err(err) => {
                debug!(error = %err, "unparseable client frame");
                Some(ServerEvent::Error {
                    message: "invalid message".into(),
                })
            }
        };

        if let Some(event) = reply {
            if !connection.send_event(&event) {
                debug!("failed to enqueue reply (channel full or closed)");
            }
        }
    }

    // Teardown: unregister first so the disconnect fan-out cannot target us.
    info!("client disconnected");
    let _ = table.remove(&conn_id);
    relay.handle_disconnect(&conn_id);

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    outbound.abort();
}
