//! Per-connection WebSocket state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use paircam_core::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;
use tracing::warn;

/// A connected WebSocket client.
///
/// Outbound frames go through a bounded channel to the socket's write task;
/// `send` never blocks, so a slow reader sheds events instead of stalling
/// its peer's session loop.
pub struct RelayConnection {
    /// Unique connection ID, minted at upgrade time.
    pub id: ConnectionId,
    /// Send channel to the connection's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded since the last ping cycle.
    is_alive: AtomicBool,
    /// When the last pong (or any frame) was received.
    last_pong: Mutex<Instant>,
    /// Frames dropped on a full or closed channel.
    dropped: AtomicU64,
}

impl RelayConnection {
    /// Create a new connection around its outbound channel.
    #[must_use]
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a pre-serialized frame.
    ///
    /// Returns `false` (and counts the drop) if the channel is full or the
    /// write task has gone away.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Serialize a server event and enqueue it.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(json) => self.send(Arc::new(json)),
            Err(err) => {
                warn!(conn_id = %self.id, error = %err, "failed to serialize server event");
                false
            }
        }
    }

    /// Frames dropped for this connection so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record liveness (pong or any inbound frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last sign of life.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for the heartbeat loop.
    ///
    /// Returns `true` if the client showed life since the previous check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
