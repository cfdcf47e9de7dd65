//! Pairing registry — sessions and role bindings behind a single mutex.
//!
//! Session records and the connection bindings for both roles live in one
//! [`parking_lot::Mutex`]. Pairing decisions read bindings and session state
//! together (join, peer lookup, disconnect teardown), so guarding them with
//! separate locks would allow a rejoin to race its predecessor's teardown.
//! All operations are short map manipulations; the lock is never held across
//! an await point.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use paircam_core::{ConnectionId, RelayError, Result, Role, Session, SessionStatus, SessionToken};

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionToken, Session>,
    controllers: HashMap<SessionToken, ConnectionId>,
    companions: HashMap<SessionToken, ConnectionId>,
}

impl Inner {
    fn bindings_mut(&mut self, role: Role) -> &mut HashMap<SessionToken, ConnectionId> {
        match role {
            Role::Controller => &mut self.controllers,
            Role::Companion => &mut self.companions,
        }
    }

    fn bindings(&self, role: Role) -> &HashMap<SessionToken, ConnectionId> {
        match role {
            Role::Controller => &self.controllers,
            Role::Companion => &self.companions,
        }
    }

    fn remove_bindings(&mut self, token: &SessionToken) {
        let _ = self.controllers.remove(token);
        let _ = self.companions.remove(token);
    }
}

/// Registry of live sessions and their role bindings.
#[derive(Default)]
pub struct PairingRegistry {
    inner: Mutex<Inner>,
}

impl PairingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh idle session and return a snapshot of it.
    pub fn create_session(&self) -> Session {
        let session = Session::new(SessionToken::new());
        let mut inner = self.inner.lock();
        let _ = inner
            .sessions
            .insert(session.token.clone(), session.clone());
        session
    }

    /// Snapshot a session by token.
    pub fn get(&self, token: &SessionToken) -> Option<Session> {
        self.inner.lock().sessions.get(token).cloned()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Apply a mutation to a session.
    pub fn touch<F>(&self, token: &SessionToken, f: F) -> Result<()>
    where
        F: FnOnce(&mut Session),
    {
        let mut inner = self.inner.lock();
        let session = inner
            .sessions
            .get_mut(token)
            .ok_or(RelayError::SessionNotFound)?;
        f(session);
        Ok(())
    }

    /// Remove a session and both of its bindings. Returns whether the
    /// session existed.
    pub fn delete(&self, token: &SessionToken) -> bool {
        let mut inner = self.inner.lock();
        let existed = inner.sessions.remove(token).is_some();
        inner.remove_bindings(token);
        existed
    }

    /// Remove every session whose TTL has elapsed at `now`, along with its
    /// bindings. Returns the evicted tokens.
    pub fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<SessionToken> {
        let mut inner = self.inner.lock();
        let expired: Vec<SessionToken> = inner
            .sessions
            .values()
            .filter(|s| s.is_expired(now, ttl))
            .map(|s| s.token.clone())
            .collect();
        for token in &expired {
            let _ = inner.sessions.remove(token);
            inner.remove_bindings(token);
        }
        expired
    }

    /// Bind a connection to a session role, replacing any previous binding
    /// for that role (last writer wins). Companion binds move the session to
    /// `Paired`.
    pub fn bind(&self, token: &SessionToken, role: Role, conn: ConnectionId) -> Result<Session> {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(token) {
            return Err(RelayError::SessionNotFound);
        }
        let _ = inner.bindings_mut(role).insert(token.clone(), conn);
        // contains_key checked above; get_mut cannot fail here
        if let Some(session) = inner.sessions.get_mut(token) {
            match role {
                Role::Controller => session.pc_connected = true,
                Role::Companion => {
                    session.mobile_connected = true;
                    session.status = SessionStatus::Paired;
                }
            }
            Ok(session.clone())
        } else {
            Err(RelayError::SessionNotFound)
        }
    }

    /// The connection bound as the peer of `role` in the session.
    pub fn peer_of(&self, token: &SessionToken, role: Role) -> Option<ConnectionId> {
        self.inner.lock().bindings(role.peer()).get(token).cloned()
    }

    /// The connection bound as `role` in the session.
    pub fn bound(&self, token: &SessionToken, role: Role) -> Option<ConnectionId> {
        self.inner.lock().bindings(role).get(token).cloned()
    }

    /// Both bound connections for a session (controller first).
    ///
    /// Errors if the session does not exist; an existing session with no
    /// bindings yields an empty vec.
    pub fn bound_peers(&self, token: &SessionToken) -> Result<Vec<ConnectionId>> {
        let inner = self.inner.lock();
        if !inner.sessions.contains_key(token) {
            return Err(RelayError::SessionNotFound);
        }
        let mut peers = Vec::with_capacity(2);
        if let Some(conn) = inner.controllers.get(token) {
            peers.push(conn.clone());
        }
        if let Some(conn) = inner.companions.get(token) {
            peers.push(conn.clone());
        }
        Ok(peers)
    }

    /// Find the session and role a connection is currently bound under.
    pub fn lookup_by_conn(&self, conn: &ConnectionId) -> Option<(SessionToken, Role)> {
        let inner = self.inner.lock();
        for (token, bound) in &inner.controllers {
            if bound == conn {
                return Some((token.clone(), Role::Controller));
            }
        }
        for (token, bound) in &inner.companions {
            if bound == conn {
                return Some((token.clone(), Role::Companion));
            }
        }
        None
    }

    /// Release the binding held by `conn`, if it still holds one.
    ///
    /// Lookup is by connection identity, so a superseded connection's late
    /// disconnect never tears down its replacement. Clears the presence flag
    /// and resets the status to `Idle` when a binding is released.
    pub fn release_conn(&self, conn: &ConnectionId) -> Option<(SessionToken, Role)> {
        let mut inner = self.inner.lock();

        let found = inner
            .controllers
            .iter()
            .find(|(_, bound)| *bound == conn)
            .map(|(token, _)| (token.clone(), Role::Controller))
            .or_else(|| {
                inner
                    .companions
                    .iter()
                    .find(|(_, bound)| *bound == conn)
                    .map(|(token, _)| (token.clone(), Role::Companion))
            })?;

        let (token, role) = &found;
        let _ = inner.bindings_mut(*role).remove(token);
        if let Some(session) = inner.sessions.get_mut(token) {
            match role {
                Role::Controller => session.pc_connected = false,
                Role::Companion => session.mobile_connected = false,
            }
            session.status = SessionStatus::Idle;
        }
        Some(found)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
