//! Dispatcher: decodes inbound bytes and routes each envelope to the
//! queue of the component that owns its message type.
//!
//! ```text
//!                         ┌─→ heartbeat queue ─→ session registry
//!                         ├─→ state queue     ─→ state service
//!  subscriber ─→ decode ──┼─→ auth queue      ─→ authentication gate
//!                         ├─→ roster queue    ─→ roster service
//!                         ├─→ zone queue      ─→ zone service
//!                         └─→ outbound queue  ─→ broadcast relay (chat, broadcast)
//! ```
//!
//! Every queue is bounded and the dispatcher never waits on one: a full
//! queue costs that one envelope, not the whole ingress loop.

use std::fmt;
use std::time::Duration;

use hearth_protocol::{
    AuthRequest, ClientId, Codec, Envelope, HeartbeatRecord, Inbound, InboundEnvelope,
    MessageType, Outbound, OutboundEnvelope, PlayerState, unix_millis,
};
use hearth_transport::Subscriber;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::{DispatchError, ZoneRequest};

/// Pause after a transport receive error before trying again.
const RECEIVE_BACKOFF: Duration = Duration::from_millis(250);

/// Where an envelope was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    StateUpdate,
    Heartbeat,
    Auth,
    Roster,
    Zone,
    /// Chat and broadcast: straight to the outbound queue.
    Relay,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StateUpdate => "state-update",
            Self::Heartbeat => "heartbeat",
            Self::Auth => "auth",
            Self::Roster => "roster",
            Self::Zone => "zone",
            Self::Relay => "relay",
        })
    }
}

/// The sending side of every work queue the dispatcher feeds.
#[derive(Clone)]
pub struct Queues {
    pub state: mpsc::Sender<PlayerState>,
    pub heartbeat: mpsc::Sender<HeartbeatRecord>,
    pub auth: mpsc::Sender<AuthRequest>,
    /// Roster requests carry only the requester's id.
    pub roster: mpsc::Sender<ClientId>,
    pub zone: mpsc::Sender<ZoneRequest>,
    pub outbound: mpsc::Sender<OutboundEnvelope>,
}

/// Classifies inbound envelopes and forwards them.
pub struct Dispatcher<C> {
    codec: C,
    queues: Queues,
}

impl<C: Codec> Dispatcher<C> {
    pub fn new(codec: C, queues: Queues) -> Self {
        Self { codec, queues }
    }

    /// Decodes one raw message and routes it.
    ///
    /// # Errors
    /// Any [`DispatchError`]; the envelope has been dropped.
    pub fn dispatch(&self, bytes: &[u8]) -> Result<Route, DispatchError> {
        let envelope = InboundEnvelope::decode(&self.codec, bytes)?;
        self.route(envelope)
    }

    /// Routes an already-decoded envelope to exactly one queue.
    ///
    /// # Errors
    /// `MissingClientId`, `QueueFull`, or `QueueClosed`.
    pub fn route(&self, envelope: InboundEnvelope) -> Result<Route, DispatchError> {
        let Envelope { client_id, message } = envelope;

        match message {
            Inbound::Heartbeat(payload) => {
                require_sender(&client_id, MessageType::Heartbeat)?;
                let record = HeartbeatRecord {
                    client_id,
                    timestamp: unix_millis(),
                    status: payload.status,
                };
                forward(&self.queues.heartbeat, Route::Heartbeat, record)
            }
            Inbound::PlayerState(mut state) => {
                // The envelope, not the payload, says who sent it.
                state.client_id = client_id;
                forward(&self.queues.state, Route::StateUpdate, state)
            }
            Inbound::PlayerAuth(request) => forward(&self.queues.auth, Route::Auth, request),
            Inbound::Knock => {
                require_sender(&client_id, MessageType::Knock)?;
                forward(&self.queues.roster, Route::Roster, client_id)
            }
            Inbound::Chat(data) => {
                let envelope = Envelope::new(client_id, Outbound::Chat(data));
                forward(&self.queues.outbound, Route::Relay, envelope)
            }
            Inbound::Broadcast(data) => {
                let envelope = Envelope::new(client_id, Outbound::Broadcast(data));
                forward(&self.queues.outbound, Route::Relay, envelope)
            }
            Inbound::Connected => {
                forward(&self.queues.zone, Route::Zone, ZoneRequest::Snapshot { client_id })
            }
            Inbound::Zone(query) => forward(
                &self.queues.zone,
                Route::Zone,
                ZoneRequest::Fetch {
                    client_id,
                    name: query.name,
                },
            ),
            Inbound::UpdateZone(patch) => forward(
                &self.queues.zone,
                Route::Zone,
                ZoneRequest::Update {
                    client_id,
                    name: patch.name,
                    patch: patch.patch,
                },
            ),
        }
    }

    /// Ingress loop: pulls from the subscriber until it ends or `cancel`
    /// fires. Individual bad messages never stop the loop.
    pub async fn run<Sub: Subscriber>(self, mut subscriber: Sub, cancel: CancellationToken) {
        tracing::info!("dispatcher started");

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => break,
                next = subscriber.next_message() => next,
            };

            match next {
                Ok(Some(bytes)) => self.ingest(&bytes),
                Ok(None) => {
                    tracing::info!("inbound subscription ended");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "receive failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("dispatcher stopped");
    }

    fn ingest(&self, bytes: &[u8]) {
        match self.dispatch(bytes) {
            Ok(route) => tracing::trace!(%route, "envelope dispatched"),
            Err(e @ (DispatchError::QueueFull(_) | DispatchError::QueueClosed(_))) => {
                tracing::warn!(error = %e, "envelope dropped");
            }
            Err(e) => tracing::debug!(error = %e, "envelope dropped"),
        }
    }
}

fn require_sender(client_id: &ClientId, kind: MessageType) -> Result<(), DispatchError> {
    if client_id.is_empty() {
        return Err(DispatchError::MissingClientId(kind));
    }
    Ok(())
}

fn forward<T>(queue: &mpsc::Sender<T>, route: Route, item: T) -> Result<Route, DispatchError> {
    queue.try_send(item).map_err(|e| match e {
        TrySendError::Full(_) => DispatchError::QueueFull(route),
        TrySendError::Closed(_) => DispatchError::QueueClosed(route),
    })?;
    Ok(route)
}

// =========================================================================
// Tests
// =========================================================================
