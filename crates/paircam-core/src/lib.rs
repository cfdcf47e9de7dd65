//! # paircam-core
//!
//! Core types for the PairCam pairing and capture-relay server:
//!
//! - Branded ID newtypes ([`SessionToken`], [`ConnectionId`])
//! - Session domain types ([`Session`], [`SessionStatus`], [`Role`])
//! - The WebSocket wire protocol ([`ClientEvent`], [`ServerEvent`])
//! - The relay error taxonomy ([`RelayError`])
//! - Tracing subscriber bootstrap ([`logging::init_subscriber`])

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod session;

pub use errors::{RelayError, Result};
pub use ids::{ConnectionId, SessionToken};
pub use protocol::{ClientEvent, ServerEvent};
pub use session::{Role, Session, SessionStatus};
