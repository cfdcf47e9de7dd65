//! # paircam-server
//!
//! Axum HTTP + `WebSocket` server for PairCam session pairing and capture
//! relay.
//!
//! - HTTP endpoints: session mint, session status, health check, metrics
//! - `WebSocket` gateway: connection table, heartbeat, event dispatch
//! - Pairing registry: sessions and role bindings behind a single mutex
//! - Relay: validates client events and forwards each to exactly one peer
//! - Expiry sweeper: periodic TTL eviction with no peer notification
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod http;
pub mod metrics;
pub mod net;
pub mod pairing;
pub mod relay;
pub mod server;
pub mod shutdown;
pub mod sweeper;
pub mod websocket;
