//! Session types: the server's record of one connected game client.
//!
//! A session tracks:
//! - WHO the client is (`ClientId`)
//! - WHETHER it has logged in (`authenticated`, only ever false → true)
//! - WHAT it last looked like (the latest `PlayerState`, if any)
//! - WHEN it was last heard from, and with what presence status

use std::time::Duration;

use hearth_protocol::{ClientId, PlayerState, PresenceStatus, unix_millis};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for presence tracking.
///
/// `Default` gives the daemon's stock timings: sweep every 10 seconds and
/// forget clients that have been silent for 10 seconds.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the presence sweep runs. Raised to
    /// [`MIN_SWEEP_INTERVAL`](crate::MIN_SWEEP_INTERVAL) if shorter.
    pub sweep_interval: Duration,

    /// How long a client may stay silent before the sweep removes it.
    pub expiry: Duration,

    /// When `true`, a state update counts as a sign of life: it refreshes
    /// liveness and creates a session for an unseen client.
    pub state_refreshes_liveness: bool,

    /// Capacity of the registry's command queue. Zero is raised to 1.
    pub command_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            expiry: Duration::from_secs(10),
            state_refreshes_liveness: false,
            command_capacity: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// Seen
// ---------------------------------------------------------------------------

/// A moment a client was heard from, on both clocks.
///
/// `at` is monotonic and drives expiry; `unix_ms` is wall-clock time and
/// is what goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seen {
    pub at: Instant,
    pub unix_ms: u64,
}

impl Seen {
    /// The current moment.
    pub fn now() -> Self {
        Self {
            at: Instant::now(),
            unix_ms: unix_millis(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single client's session.
///
/// Created on the first heartbeat from an unseen client id. Lives until
/// the client says `QUIT` or goes silent past the expiry window. A stored
/// session never has status `QUIT`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub client_id: ClientId,

    /// Set once the client logs in; never cleared.
    pub authenticated: bool,

    /// The most recent state snapshot the client published.
    pub state: Option<PlayerState>,

    /// Latest presence status.
    pub status: PresenceStatus,

    /// Unix milliseconds of the last heartbeat, as reported on the wire.
    pub last_heartbeat: u64,

    /// Monotonic time the client was last heard from.
    pub last_seen: Instant,
}

impl Session {
    pub(crate) fn new(client_id: ClientId, status: PresenceStatus, seen: Seen) -> Self {
        Self {
            client_id,
            authenticated: false,
            state: None,
            status,
            last_heartbeat: seen.unix_ms,
            last_seen: seen.at,
        }
    }

    /// Display name from the last state snapshot, if the client sent one.
    pub fn name(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.name.as_deref())
    }

    pub(crate) fn touch(&mut self, seen: Seen) {
        self.last_heartbeat = seen.unix_ms;
        self.last_seen = seen.at;
    }
}
