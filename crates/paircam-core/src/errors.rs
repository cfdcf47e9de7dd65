//! Relay error taxonomy.
//!
//! The `Display` strings are part of the wire protocol: they are sent
//! verbatim to clients in `error` events, and the mobile/desktop apps match
//! on them. Do not reword without coordinating a client release.

use thiserror::Error;

/// Errors produced while validating or relaying a client event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RelayError {
    /// The referenced session does not exist (never minted, ended, or expired).
    #[error("Session not found")]
    SessionNotFound,
    /// The operation requires a bound controller (PC) connection.
    #[error("PC not connected")]
    ControllerNotConnected,
    /// The operation requires a bound companion (mobile) connection.
    #[error("Mobile not connected")]
    CompanionNotConnected,
}

impl RelayError {
    /// Stable snake_case name, used as a metrics label.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionNotFound => "session_not_found",
            Self::ControllerNotConnected => "controller_not_connected",
            Self::CompanionNotConnected => "companion_not_connected",
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_messages_are_stable() {
        assert_eq!(RelayError::SessionNotFound.to_string(), "Session not found");
        assert_eq!(
            RelayError::ControllerNotConnected.to_string(),
            "PC not connected"
        );
        assert_eq!(
            RelayError::CompanionNotConnected.to_string(),
            "Mobile not connected"
        );
    }

    #[test]
    fn names_are_snake_case() {
        for err in [
            RelayError::SessionNotFound,
            RelayError::ControllerNotConnected,
            RelayError::CompanionNotConnected,
        ] {
            assert!(
                err.name()
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c == '_'),
                "name '{}' must be snake_case",
                err.name()
            );
        }
    }

    #[test]
    fn errors_are_comparable() {
        assert_eq!(RelayError::SessionNotFound, RelayError::SessionNotFound);
        assert_ne!(
            RelayError::SessionNotFound,
            RelayError::ControllerNotConnected
        );
    }
}
