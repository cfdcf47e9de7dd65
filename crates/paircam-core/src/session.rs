//! Session domain types.
//!
//! A session pairs exactly one controller (the PC supplying webcam captures)
//! with exactly one companion (the mobile app requesting them). The session
//! record tracks presence flags and a coarse status; both are reported by the
//! HTTP status endpoint with the legacy field names (`pc_connected`,
//! `mobile_connected`).

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SessionToken;

/// The two endpoint roles a connection can bind as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The PC. Supplies webcam captures.
    Controller,
    /// The mobile app. Requests captures and receives image payloads.
    Companion,
}

impl Role {
    /// The opposite role.
    #[must_use]
    pub fn peer(self) -> Self {
        match self {
            Self::Controller => Self::Companion,
            Self::Companion => Self::Controller,
        }
    }
}

/// Coarse session status reported by the status endpoint.
///
/// The status is informational: no relay operation gates on it. It moves to
/// `Paired` when a companion binds or a capture is delivered, `Capturing`
/// while a capture request is outstanding, and back to `Idle` whenever a
/// binding is released.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No companion bound (or a binding was just released).
    #[default]
    Idle,
    /// Companion bound; no capture in flight.
    Paired,
    /// A capture request has been relayed to the controller.
    Capturing,
}

/// A pairing session record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The session token (also the session's identity).
    pub token: SessionToken,
    /// When the session was minted. Expiry is absolute from this instant.
    pub created_at: DateTime<Utc>,
    /// Whether a controller connection is currently bound.
    pub pc_connected: bool,
    /// Whether a companion connection is currently bound.
    pub mobile_connected: bool,
    /// Coarse status.
    pub status: SessionStatus,
}

impl Session {
    /// Create a fresh idle session minted now.
    #[must_use]
    pub fn new(token: SessionToken) -> Self {
        Self::with_created_at(token, Utc::now())
    }

    /// Create a session with an explicit mint time (for tests and sweeps).
    #[must_use]
    pub fn with_created_at(token: SessionToken, created_at: DateTime<Utc>) -> Self {
        Self {
            token,
            created_at,
            pc_connected: false,
            mobile_connected: false,
            status: SessionStatus::Idle,
        }
    }

    /// Whether the session has outlived its TTL at `now`.
    ///
    /// Expiry is anchored at `created_at` — presence and activity do not
    /// extend a session's life.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match (now - self.created_at).to_std() {
            Ok(age) => age >= ttl,
            // created_at in the future (clock skew) — not expired
            Err(_) => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn make_session() -> Session {
        Session::new(SessionToken::from("tok-1"))
    }

    #[test]
    fn new_session_is_idle() {
        let s = make_session();
        assert!(!s.pc_connected);
        assert!(!s.mobile_connected);
        assert_eq!(s.status, SessionStatus::Idle);
    }

    #[test]
    fn role_peer() {
        assert_eq!(Role::Controller.peer(), Role::Companion);
        assert_eq!(Role::Companion.peer(), Role::Controller);
    }

    #[test]
    fn status_serde_lowercase() {
        for (status, expected) in [
            (SessionStatus::Idle, "\"idle\""),
            (SessionStatus::Paired, "\"paired\""),
            (SessionStatus::Capturing, "\"capturing\""),
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, expected);
            let back: SessionStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn session_serializes_with_legacy_field_names() {
        let s = make_session();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["token"], "tok-1");
        assert_eq!(json["pc_connected"], false);
        assert_eq!(json["mobile_connected"], false);
        assert_eq!(json["status"], "idle");
        assert!(json["created_at"].is_string());
    }

    #[test]
    fn not_expired_before_ttl() {
        let s = make_session();
        let now = s.created_at + TimeDelta::seconds(299);
        assert!(!s.is_expired(now, Duration::from_secs(300)));
    }

    #[test]
    fn expired_at_exact_ttl() {
        let s = make_session();
        let now = s.created_at + TimeDelta::seconds(300);
        assert!(s.is_expired(now, Duration::from_secs(300)));
    }

    #[test]
    fn expired_well_past_ttl() {
        let s = make_session();
        let now = s.created_at + TimeDelta::seconds(10_000);
        assert!(s.is_expired(now, Duration::from_secs(300)));
    }

    #[test]
    fn presence_does_not_extend_ttl() {
        let mut s = make_session();
        s.pc_connected = true;
        s.mobile_connected = true;
        s.status = SessionStatus::Capturing;
        let now = s.created_at + TimeDelta::seconds(301);
        assert!(s.is_expired(now, Duration::from_secs(300)));
    }

    #[test]
    fn future_created_at_is_not_expired() {
        let s = make_session();
        let now = s.created_at - TimeDelta::seconds(10);
        assert!(!s.is_expired(now, Duration::from_secs(300)));
    }

    #[test]
    fn session_roundtrips_through_json() {
        let s = make_session();
        let json = serde_json::to_string(&s).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
