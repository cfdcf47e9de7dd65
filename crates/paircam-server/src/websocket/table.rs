//! Connection table — live connections indexed by ID.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use paircam_core::{ConnectionId, ServerEvent};
use tracing::{debug, warn};

use crate::metrics::WS_SEND_DROPS_TOTAL;

use super::connection::RelayConnection;

/// All live WebSocket connections.
///
/// The relay addresses peers by `ConnectionId`; this table is the only
/// mapping from those IDs to send channels. Lock is held only for map
/// lookups, never across sends or awaits.
pub struct ConnectionTable {
    connections: RwLock<HashMap<ConnectionId, Arc<RelayConnection>>>,
}

impl ConnectionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection.
    pub fn insert(&self, connection: Arc<RelayConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<RelayConnection>> {
        self.connections.write().remove(id)
    }

    /// Look up a connection by ID.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<RelayConnection>> {
        self.connections.read().get(id).cloned()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Send a server event to exactly one connection.
    ///
    /// Returns `false` if the connection is gone or its channel rejected the
    /// frame. Drops are counted but the connection is left in place; its own
    /// heartbeat tears it down if the client is truly dead.
    pub fn send_to(&self, id: &ConnectionId, event: &ServerEvent) -> bool {
        let Some(conn) = self.get(id) else {
            debug!(conn_id = %id, "send to unknown connection");
            return false;
        };
        if conn.send_event(event) {
            true
        } else {
            counter!(WS_SEND_DROPS_TOTAL).increment(1);
            warn!(
                conn_id = %id,
                drops = conn.drop_count(),
                "dropped outbound event (channel full or closed)"
            );
            false
        }
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}
