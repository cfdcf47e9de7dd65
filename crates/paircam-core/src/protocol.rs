//! WebSocket wire protocol.
//!
//! All frames are JSON objects tagged by a `type` field. Event names and
//! field names match the legacy protocol spoken by the existing PC and
//! mobile clients (`pc`/`mobile` terminology on the wire, controller/
//! companion in code).

use serde::{Deserialize, Serialize};

use crate::ids::SessionToken;

/// Events a client sends to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Controller joins (or rejoins) a session.
    JoinPcSession {
        /// Session to bind to.
        token: SessionToken,
    },
    /// Companion joins (or rejoins) a session.
    JoinMobileSession {
        /// Session to bind to.
        token: SessionToken,
    },
    /// Companion asks the controller to take a capture.
    CaptureRequest {
        /// Session the request belongs to.
        token: SessionToken,
    },
    /// Controller delivers a captured frame.
    ImageCaptured {
        /// Session the capture belongs to.
        token: SessionToken,
        /// Opaque image payload (base64 data URL in practice).
        image_data: String,
    },
    /// Controller reports a webcam failure.
    WebcamError {
        /// Session the failure belongs to.
        token: SessionToken,
        /// Human-readable failure description.
        message: String,
    },
    /// Either side ends the session for both peers.
    EndSession {
        /// Session to end.
        token: SessionToken,
    },
}

impl ClientEvent {
    /// The session token the event refers to.
    #[must_use]
    pub fn token(&self) -> &SessionToken {
        match self {
            Self::JoinPcSession { token }
            | Self::JoinMobileSession { token }
            | Self::CaptureRequest { token }
            | Self::ImageCaptured { token, .. }
            | Self::WebcamError { token, .. }
            | Self::EndSession { token } => token,
        }
    }

    /// Stable wire name, used as a metrics label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinPcSession { .. } => "join_pc_session",
            Self::JoinMobileSession { .. } => "join_mobile_session",
            Self::CaptureRequest { .. } => "capture_request",
            Self::ImageCaptured { .. } => "image_captured",
            Self::WebcamError { .. } => "webcam_error",
            Self::EndSession { .. } => "end_session",
        }
    }
}

/// Events the server sends to a client. Every one targets exactly one
/// connection — the relay never broadcasts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Ack to the controller's join.
    PcJoined {
        /// The joined session.
        token: SessionToken,
    },
    /// Ack to the companion's join.
    MobileJoined {
        /// The joined session.
        token: SessionToken,
    },
    /// Tells the controller a companion has joined its session.
    MobileConnected {
        /// The paired session.
        token: SessionToken,
    },
    /// Tells the controller to take a capture.
    CaptureImage {
        /// The session the capture is for.
        token: SessionToken,
    },
    /// Delivers a captured frame to the companion.
    ImageReceived {
        /// The session the capture belongs to.
        token: SessionToken,
        /// Opaque image payload, relayed unchanged.
        image_data: String,
    },
    /// Relays a controller-side webcam failure to the companion.
    WebcamError {
        /// The session the failure belongs to.
        token: SessionToken,
        /// Failure description, relayed unchanged.
        message: String,
    },
    /// Tells a bound peer its session was explicitly ended.
    SessionEnded {
        /// The ended session.
        token: SessionToken,
    },
    /// Tells the controller its companion disconnected. Carries no payload,
    /// matching the legacy protocol.
    MobileDisconnected,
    /// Tells the companion its controller disconnected. Only emitted when
    /// symmetric disconnect notification is enabled in settings.
    PcDisconnected,
    /// Validation failure for the requesting connection.
    Error {
        /// Wire message from [`crate::RelayError`].
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
