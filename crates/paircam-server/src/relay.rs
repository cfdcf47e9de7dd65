//! Event relay — validates client events and forwards each to exactly one
//! bound peer.
//!
//! The relay never broadcasts and never stores payloads: an `image_captured`
//! frame is re-serialized for the bound companion and forgotten. Validation
//! failures come back to the sender as an `error` event; the connection
//! stays open.

use std::sync::Arc;

use metrics::{counter, gauge};
use paircam_core::{ClientEvent, ConnectionId, RelayError, Role, ServerEvent, SessionStatus};
use tracing::{debug, info};

use crate::metrics::{RELAY_ERRORS_TOTAL, RELAY_EVENTS_TOTAL, SESSIONS_ACTIVE, SESSIONS_ENDED_TOTAL};
use crate::pairing::PairingRegistry;
use crate::websocket::ConnectionTable;

/// Dispatches client events against the pairing registry and connection
/// table.
pub struct Relay {
    registry: Arc<PairingRegistry>,
    table: Arc<ConnectionTable>,
    notify_on_controller_loss: bool,
}

impl Relay {
    /// Create a relay over shared pairing and connection state.
    #[must_use]
    pub fn new(
        registry: Arc<PairingRegistry>,
        table: Arc<ConnectionTable>,
        notify_on_controller_loss: bool,
    ) -> Self {
        Self {
            registry,
            table,
            notify_on_controller_loss,
        }
    }

    /// Handle one client event from `conn`.
    ///
    /// Side effects (peer forwards, registry mutations) happen here; the
    /// returned event, if any, is the direct reply for the sender.
    pub fn handle_event(&self, conn: &ConnectionId, event: ClientEvent) -> Option<ServerEvent> {
        counter!(RELAY_EVENTS_TOTAL, "event" => event.name()).increment(1);

        let result = match event {
            ClientEvent::JoinPcSession { token } => self
                .registry
                .bind(&token, Role::Controller, conn.clone())
                .map(|session| {
                    info!(token = %session.token, conn_id = %conn, "controller joined session");
                    Some(ServerEvent::PcJoined {
                        token: session.token,
                    })
                }),

            ClientEvent::JoinMobileSession { token } => self
                .registry
                .bind(&token, Role::Companion, conn.clone())
                .map(|session| {
                    info!(token = %session.token, conn_id = %conn, "companion joined session");
                    if let Some(controller) = self.registry.peer_of(&token, Role::Companion) {
                        let _ = self.table.send_to(
                            &controller,
                            &ServerEvent::MobileConnected {
                                token: token.clone(),
                            },
                        );
                    }
                    Some(ServerEvent::MobileJoined { token })
                }),

            ClientEvent::CaptureRequest { token } => {
                self.registry.get(&token).ok_or(RelayError::SessionNotFound).and_then(|_| {
                    let controller = self
                        .registry
                        .bound(&token, Role::Controller)
                        .ok_or(RelayError::ControllerNotConnected)?;
                    self.registry
                        .touch(&token, |s| s.status = SessionStatus::Capturing)?;
                    debug!(token = %token, "capture requested");
                    let _ = self.table.send_to(
                        &controller,
                        &ServerEvent::CaptureImage { token },
                    );
                    Ok(None)
                })
            }

            ClientEvent::ImageCaptured { token, image_data } => {
                self.registry.get(&token).ok_or(RelayError::SessionNotFound).and_then(|_| {
                    let companion = self
                        .registry
                        .bound(&token, Role::Companion)
                        .ok_or(RelayError::CompanionNotConnected)?;
                    self.registry
                        .touch(&token, |s| s.status = SessionStatus::Paired)?;
                    debug!(token = %token, bytes = image_data.len(), "relaying captured frame");
                    let _ = self.table.send_to(
                        &companion,
                        &ServerEvent::ImageReceived { token, image_data },
                    );
                    Ok(None)
                })
            }

            ClientEvent::WebcamError { token, message } => {
                // Pure relay: no status change, even mid-capture
                self.registry.get(&token).ok_or(RelayError::SessionNotFound).map(|_| {
                    if let Some(companion) = self.registry.bound(&token, Role::Companion) {
                        info!(token = %token, message, "relaying webcam failure");
                        let _ = self
                            .table
                            .send_to(&companion, &ServerEvent::WebcamError { token, message });
                    } else {
                        // No companion to tell; drop silently
                        debug!(token = %token, "webcam failure with no companion bound");
                    }
                    None
                })
            }

            ClientEvent::EndSession { token } => {
                self.registry.bound_peers(&token).map(|peers| {
                    for peer in peers {
                        let _ = self.table.send_to(
                            &peer,
                            &ServerEvent::SessionEnded {
                                token: token.clone(),
                            },
                        );
                    }
                    // A racing sweep may have removed the session already;
                    // only the actual deleter records the end.
                    if self.registry.delete(&token) {
                        info!(token = %token, "session ended");
                        counter!(SESSIONS_ENDED_TOTAL).increment(1);
                        gauge!(SESSIONS_ACTIVE).decrement(1.0);
                    }
                    None
                })
            }
        };

        match result {
            Ok(reply) => reply,
            Err(err) => {
                counter!(RELAY_ERRORS_TOTAL, "error" => err.name()).increment(1);
                debug!(conn_id = %conn, error = %err, "client event rejected");
                Some(ServerEvent::Error {
                    message: err.to_string(),
                })
            }
        }
    }

    /// Tear down whatever binding `conn` still holds.
    ///
    /// Companion loss tells the bound controller; controller loss is silent
    /// unless symmetric notification is enabled. A superseded connection's
    /// late disconnect releases nothing.
    pub fn handle_disconnect(&self, conn: &ConnectionId) {
        let Some((token, role)) = self.registry.release_conn(conn) else {
            return;
        };
        info!(token = %token, conn_id = %conn, role = ?role, "bound connection lost");

        match role {
            Role::Companion => {
                if let Some(controller) = self.registry.bound(&token, Role::Controller) {
                    let _ = self
                        .table
                        .send_to(&controller, &ServerEvent::MobileDisconnected);
                }
            }
            Role::Controller => {
                if self.notify_on_controller_loss {
                    if let Some(companion) = self.registry.bound(&token, Role::Companion) {
                        let _ = self.table.send_to(&companion, &ServerEvent::PcDisconnected);
                    }
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::RelayConnection;
    use paircam_core::SessionToken;
    use tokio::sync::mpsc;

    struct Harness {
        relay: Relay,
        registry: Arc<PairingRegistry>,
        table: Arc<ConnectionTable>,
    }

    fn harness(notify_on_controller_loss: bool) -> Harness {
        let registry = Arc::new(PairingRegistry::new());
        let table = Arc::new(ConnectionTable::new());
        let relay = Relay::new(
            Arc::clone(&registry),
            Arc::clone(&table),
            notify_on_controller_loss,
        );
        Harness {
            relay,
            registry,
            table,
        }
    }

    fn connect(h: &Harness, id: &str) -> (ConnectionId, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn_id = ConnectionId::from(id);
        h.table
            .insert(Arc::new(RelayConnection::new(conn_id.clone(), tx)));
        (conn_id, rx)
    }

    fn recv_json(rx: &mut mpsc::Receiver<Arc<String>>) -> serde_json::Value {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).unwrap()
    }

    fn pair(h: &Harness) -> (
        SessionToken,
        ConnectionId,
        mpsc::Receiver<Arc<String>>,
        ConnectionId,
        mpsc::Receiver<Arc<String>>,
    ) {
        let token = h.registry.create_session().token;
        let (pc, mut pc_rx) = connect(h, "pc-1");
        let (mob, mut mob_rx) = connect(h, "mob-1");

        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::JoinPcSession {
                token: token.clone(),
            },
        );
        assert!(matches!(reply, Some(ServerEvent::PcJoined { .. })));

        let reply = h.relay.handle_event(
            &mob,
            ClientEvent::JoinMobileSession {
                token: token.clone(),
            },
        );
        assert!(matches!(reply, Some(ServerEvent::MobileJoined { .. })));

        // Controller is told the companion arrived
        assert_eq!(recv_json(&mut pc_rx)["type"], "mobile_connected");
        assert!(mob_rx.try_recv().is_err());

        (token, pc, pc_rx, mob, mob_rx)
    }

    #[tokio::test]
    async fn join_unknown_session_errors() {
        let h = harness(false);
        let (pc, _rx) = connect(&h, "pc-1");
        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::JoinPcSession {
                token: SessionToken::from("nope"),
            },
        );
        assert_eq!(
            reply,
            Some(ServerEvent::Error {
                message: "Session not found".into()
            })
        );
    }

    #[tokio::test]
    async fn companion_join_pairs_and_notifies_controller() {
        let h = harness(false);
        let (token, _pc, _pc_rx, _mob, _mob_rx) = pair(&h);
        assert_eq!(
            h.registry.get(&token).unwrap().status,
            SessionStatus::Paired
        );
    }

    #[tokio::test]
    async fn companion_join_without_controller_is_fine() {
        let h = harness(false);
        let token = h.registry.create_session().token;
        let (mob, _rx) = connect(&h, "mob-1");
        let reply = h
            .relay
            .handle_event(&mob, ClientEvent::JoinMobileSession { token });
        assert!(matches!(reply, Some(ServerEvent::MobileJoined { .. })));
    }

    #[tokio::test]
    async fn capture_request_forwards_to_controller() {
        let h = harness(false);
        let (token, _pc, mut pc_rx, mob, mut mob_rx) = pair(&h);

        let reply = h.relay.handle_event(
            &mob,
            ClientEvent::CaptureRequest {
                token: token.clone(),
            },
        );
        assert!(reply.is_none());

        let frame = recv_json(&mut pc_rx);
        assert_eq!(frame["type"], "capture_image");
        assert_eq!(frame["token"], token.as_str());
        assert!(mob_rx.try_recv().is_err());
        assert_eq!(
            h.registry.get(&token).unwrap().status,
            SessionStatus::Capturing
        );
    }

    #[tokio::test]
    async fn capture_request_without_controller_errors() {
        let h = harness(false);
        let token = h.registry.create_session().token;
        let (mob, _rx) = connect(&h, "mob-1");
        let _ = h.relay.handle_event(
            &mob,
            ClientEvent::JoinMobileSession {
                token: token.clone(),
            },
        );

        let reply = h
            .relay
            .handle_event(&mob, ClientEvent::CaptureRequest { token });
        assert_eq!(
            reply,
            Some(ServerEvent::Error {
                message: "PC not connected".into()
            })
        );
    }

    #[tokio::test]
    async fn capture_request_unknown_session_errors() {
        let h = harness(false);
        let (mob, _rx) = connect(&h, "mob-1");
        let reply = h.relay.handle_event(
            &mob,
            ClientEvent::CaptureRequest {
                token: SessionToken::from("nope"),
            },
        );
        assert_eq!(
            reply,
            Some(ServerEvent::Error {
                message: "Session not found".into()
            })
        );
    }

    #[tokio::test]
    async fn image_captured_reaches_companion() {
        let h = harness(false);
        let (token, pc, _pc_rx, _mob, mut mob_rx) = pair(&h);

        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::ImageCaptured {
                token: token.clone(),
                image_data: "data:image/jpeg;base64,abc".into(),
            },
        );
        assert!(reply.is_none());

        let frame = recv_json(&mut mob_rx);
        assert_eq!(frame["type"], "image_received");
        assert_eq!(frame["image_data"], "data:image/jpeg;base64,abc");
        assert_eq!(
            h.registry.get(&token).unwrap().status,
            SessionStatus::Paired
        );
    }

    #[tokio::test]
    async fn image_captured_without_companion_errors() {
        let h = harness(false);
        let token = h.registry.create_session().token;
        let (pc, _rx) = connect(&h, "pc-1");
        let _ = h.relay.handle_event(
            &pc,
            ClientEvent::JoinPcSession {
                token: token.clone(),
            },
        );

        // No outstanding request is required, only a bound companion
        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::ImageCaptured {
                token,
                image_data: "x".into(),
            },
        );
        assert_eq!(
            reply,
            Some(ServerEvent::Error {
                message: "Mobile not connected".into()
            })
        );
    }

    #[tokio::test]
    async fn unsolicited_image_is_still_relayed() {
        let h = harness(false);
        let (token, pc, _pc_rx, _mob, mut mob_rx) = pair(&h);

        // Controller pushes a frame nobody asked for; relay is permissive
        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::ImageCaptured {
                token,
                image_data: "surprise".into(),
            },
        );
        assert!(reply.is_none());
        assert_eq!(recv_json(&mut mob_rx)["type"], "image_received");
    }

    #[tokio::test]
    async fn webcam_error_reaches_companion() {
        let h = harness(false);
        let (token, pc, _pc_rx, _mob, mut mob_rx) = pair(&h);

        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::WebcamError {
                token,
                message: "camera busy".into(),
            },
        );
        assert!(reply.is_none());

        let frame = recv_json(&mut mob_rx);
        assert_eq!(frame["type"], "webcam_error");
        assert_eq!(frame["message"], "camera busy");
    }

    #[tokio::test]
    async fn webcam_error_without_companion_is_silent() {
        let h = harness(false);
        let token = h.registry.create_session().token;
        let (pc, mut pc_rx) = connect(&h, "pc-1");
        let _ = h.relay.handle_event(
            &pc,
            ClientEvent::JoinPcSession {
                token: token.clone(),
            },
        );

        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::WebcamError {
                token,
                message: "camera busy".into(),
            },
        );
        assert!(reply.is_none());
        // pc_joined ack went through the reply path, not the channel
        assert!(pc_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn webcam_error_leaves_status_untouched() {
        let h = harness(false);
        let token = h.registry.create_session().token;
        let (pc, _rx) = connect(&h, "pc-1");
        let _ = h.relay.handle_event(
            &pc,
            ClientEvent::JoinPcSession {
                token: token.clone(),
            },
        );

        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::WebcamError {
                token: token.clone(),
                message: "camera busy".into(),
            },
        );
        assert!(reply.is_none());

        // Controller-only session stays Idle; companion presence unchanged
        let session = h.registry.get(&token).unwrap();
        assert_eq!(session.status, SessionStatus::Idle);
        assert!(!session.mobile_connected);
    }

    #[tokio::test]
    async fn webcam_error_mid_capture_keeps_capturing() {
        let h = harness(false);
        let (token, pc, _pc_rx, mob, mut mob_rx) = pair(&h);

        let _ = h.relay.handle_event(
            &mob,
            ClientEvent::CaptureRequest {
                token: token.clone(),
            },
        );
        assert_eq!(
            h.registry.get(&token).unwrap().status,
            SessionStatus::Capturing
        );

        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::WebcamError {
                token: token.clone(),
                message: "camera busy".into(),
            },
        );
        assert!(reply.is_none());
        assert_eq!(recv_json(&mut mob_rx)["type"], "webcam_error");
        assert_eq!(
            h.registry.get(&token).unwrap().status,
            SessionStatus::Capturing
        );
    }

    #[tokio::test]
    async fn webcam_error_unknown_session_errors() {
        let h = harness(false);
        let (pc, _rx) = connect(&h, "pc-1");
        let reply = h.relay.handle_event(
            &pc,
            ClientEvent::WebcamError {
                token: SessionToken::from("nope"),
                message: "x".into(),
            },
        );
        assert_eq!(
            reply,
            Some(ServerEvent::Error {
                message: "Session not found".into()
            })
        );
    }

    #[tokio::test]
    async fn end_session_notifies_both_and_deletes() {
        let h = harness(false);
        let (token, _pc, mut pc_rx, mob, mut mob_rx) = pair(&h);

        let reply = h.relay.handle_event(
            &mob,
            ClientEvent::EndSession {
                token: token.clone(),
            },
        );
        assert!(reply.is_none());

        assert_eq!(recv_json(&mut pc_rx)["type"], "session_ended");
        assert_eq!(recv_json(&mut mob_rx)["type"], "session_ended");
        assert!(h.registry.get(&token).is_none());
    }

    #[tokio::test]
    async fn end_session_twice_errors_second_time() {
        let h = harness(false);
        let (token, _pc, _pc_rx, mob, _mob_rx) = pair(&h);

        let first = h.relay.handle_event(
            &mob,
            ClientEvent::EndSession {
                token: token.clone(),
            },
        );
        assert!(first.is_none());

        let second = h
            .relay
            .handle_event(&mob, ClientEvent::EndSession { token });
        assert_eq!(
            second,
            Some(ServerEvent::Error {
                message: "Session not found".into()
            })
        );
    }

    #[tokio::test]
    async fn end_session_counts_only_actual_deletions() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let h = harness(false);
            let (token, _pc, _pc_rx, mob, _mob_rx) = pair(&h);

            let first = h.relay.handle_event(
                &mob,
                ClientEvent::EndSession {
                    token: token.clone(),
                },
            );
            assert!(first.is_none());

            // The session is already gone; nothing further to count
            let second = h
                .relay
                .handle_event(&mob, ClientEvent::EndSession { token });
            assert!(matches!(second, Some(ServerEvent::Error { .. })));
        });

        assert!(handle.render().contains("sessions_ended_total 1"));
    }

    #[tokio::test]
    async fn companion_disconnect_notifies_controller() {
        let h = harness(false);
        let (token, _pc, mut pc_rx, mob, _mob_rx) = pair(&h);

        h.relay.handle_disconnect(&mob);

        let frame = recv_json(&mut pc_rx);
        assert_eq!(frame, serde_json::json!({"type": "mobile_disconnected"}));

        let session = h.registry.get(&token).unwrap();
        assert!(!session.mobile_connected);
        assert_eq!(session.status, SessionStatus::Idle);
    }

    #[tokio::test]
    async fn controller_disconnect_is_silent_by_default() {
        let h = harness(false);
        let (token, pc, _pc_rx, _mob, mut mob_rx) = pair(&h);

        h.relay.handle_disconnect(&pc);

        assert!(mob_rx.try_recv().is_err());
        assert!(!h.registry.get(&token).unwrap().pc_connected);
    }

    #[tokio::test]
    async fn controller_disconnect_notifies_when_enabled() {
        let h = harness(true);
        let (_token, pc, _pc_rx, _mob, mut mob_rx) = pair(&h);

        h.relay.handle_disconnect(&pc);

        let frame = recv_json(&mut mob_rx);
        assert_eq!(frame, serde_json::json!({"type": "pc_disconnected"}));
    }

    #[tokio::test]
    async fn disconnect_of_unbound_connection_is_a_no_op() {
        let h = harness(false);
        let (conn, _rx) = connect(&h, "stranger");
        h.relay.handle_disconnect(&conn);
    }

    #[tokio::test]
    async fn rejoin_replaces_controller_and_stale_disconnect_is_ignored() {
        let h = harness(false);
        let (token, old_pc, _old_rx, mob, mut mob_rx) = pair(&h);

        // New controller connection takes over the role
        let (new_pc, mut new_rx) = connect(&h, "pc-2");
        let reply = h.relay.handle_event(
            &new_pc,
            ClientEvent::JoinPcSession {
                token: token.clone(),
            },
        );
        assert!(matches!(reply, Some(ServerEvent::PcJoined { .. })));

        // Old connection's disconnect must not unbind pc-2
        h.relay.handle_disconnect(&old_pc);
        assert!(h.registry.get(&token).unwrap().pc_connected);

        // Capture flow now targets the replacement
        let reply = h
            .relay
            .handle_event(&mob, ClientEvent::CaptureRequest { token });
        assert!(reply.is_none());
        assert_eq!(recv_json(&mut new_rx)["type"], "capture_image");
        assert!(mob_rx.try_recv().is_err());
    }
}
