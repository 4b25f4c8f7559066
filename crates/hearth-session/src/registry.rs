//! The session registry: every connected client, keyed by client id.
//!
//! This is the presence state machine. Per client id:
//!
//! ```text
//!            heartbeat                 heartbeat (new status)
//!  Absent ───────────────→ Active/<s> ─────────────────────→ Active/<s'>
//!                              │
//!                              ├── heartbeat QUIT ──→ removed (one QUIT notice)
//!                              │
//!                              └── silent past cutoff ──→ removed (no notice)
//! ```
//!
//! # Concurrency note
//!
//! `SessionRegistry` is a plain `HashMap` wrapper and is NOT shared. It
//! is owned by the registry actor (see [`RegistryActor`](crate::RegistryActor)),
//! which is the only code that ever mutates it. Everyone else talks to
//! the actor through its queues.

use std::collections::HashMap;

use hearth_protocol::{ClientId, HeartbeatRecord, PlayerInfo, PlayerState, PresenceStatus};
use tokio::time::Instant;

use crate::{Seen, Session};

/// All live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ClientId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one heartbeat received at `at`.
    ///
    /// Returns the presence-change notification to publish, if any. One
    /// is produced when the session is created, when its status changes,
    /// and when it quits. A repeated status produces nothing.
    pub fn apply_heartbeat(
        &mut self,
        record: HeartbeatRecord,
        at: Instant,
    ) -> Option<HeartbeatRecord> {
        let seen = Seen {
            at,
            unix_ms: record.timestamp,
        };

        if record.status.is_quit() {
            return match self.sessions.remove(&record.client_id) {
                Some(_) => {
                    tracing::info!(client_id = %record.client_id, "session quit");
                    Some(record)
                }
                None => {
                    tracing::debug!(client_id = %record.client_id, "quit from unknown client ignored");
                    None
                }
            };
        }

        match self.sessions.get_mut(&record.client_id) {
            Some(session) => {
                session.touch(seen);
                if session.status == record.status {
                    return None;
                }
                tracing::debug!(
                    client_id = %record.client_id,
                    from = %session.status,
                    to = %record.status,
                    "presence changed"
                );
                session.status = record.status.clone();
                Some(record)
            }
            None => {
                let session = Session::new(record.client_id.clone(), record.status.clone(), seen);
                self.sessions.insert(record.client_id.clone(), session);
                tracing::info!(
                    client_id = %record.client_id,
                    status = %record.status,
                    sessions = self.sessions.len(),
                    "session created"
                );
                Some(record)
            }
        }
    }

    /// Stores a client's latest state snapshot.
    ///
    /// With `refresh = None` this never affects liveness and ignores
    /// unknown clients. With `Some(seen)` the update counts as a sign of
    /// life: it refreshes an existing session, or creates an `ACTIVE` one
    /// and returns the creation notice.
    pub fn record_state(
        &mut self,
        state: PlayerState,
        refresh: Option<Seen>,
    ) -> Option<HeartbeatRecord> {
        let client_id = state.client_id.clone();

        if let Some(session) = self.sessions.get_mut(&client_id) {
            if let Some(seen) = refresh {
                session.touch(seen);
            }
            session.state = Some(state);
            return None;
        }

        let seen = refresh?;
        let mut session = Session::new(client_id.clone(), PresenceStatus::Active, seen);
        session.state = Some(state);
        self.sessions.insert(client_id.clone(), session);
        tracing::info!(%client_id, "session created from state update");

        Some(HeartbeatRecord {
            client_id,
            timestamp: seen.unix_ms,
            status: PresenceStatus::Active,
        })
    }

    /// Flips the session's authenticated flag.
    ///
    /// Returns `false` (and changes nothing) if there is no such session.
    pub fn mark_authenticated(&mut self, client_id: &ClientId) -> bool {
        match self.sessions.get_mut(client_id) {
            Some(session) => {
                session.authenticated = true;
                true
            }
            None => false,
        }
    }

    /// Every known client, authenticated or not, sorted by id.
    pub fn roster(&self) -> Vec<PlayerInfo> {
        let mut roster: Vec<PlayerInfo> = self
            .sessions
            .values()
            .map(|s| PlayerInfo {
                client_id: s.client_id.clone(),
                name: s.name().map(str::to_string),
            })
            .collect();
        roster.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        roster
    }

    /// Removes every session last seen strictly before `cutoff`.
    ///
    /// Returns the removed ids. Expiry is silent: callers must not
    /// announce these.
    pub fn expire(&mut self, cutoff: Instant) -> Vec<ClientId> {
        let mut expired = Vec::new();
        self.sessions.retain(|id, session| {
            let keep = session.last_seen >= cutoff;
            if !keep {
                expired.push(id.clone());
            }
            keep
        });
        expired.sort();
        expired
    }

    /// Looks up a session.
    pub fn get(&self, client_id: &ClientId) -> Option<&Session> {
        self.sessions.get(client_id)
    }

    /// Returns the number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
