//! Publish/subscribe transport layer for Hearth.
//!
//! Provides the [`Subscriber`] and [`Publisher`] traits the daemon reads
//! from and writes to, plus two implementations:
//!
//! - [`MemoryBus`]: an in-process topic bus, for tests and embedding.
//! - [`WebSocketGateway`] (feature `websocket`, default): every connected
//!   socket receives every publish, and every frame a socket sends is an
//!   inbound message.
//!
//! Delivery is at-least-once from the daemon's point of view: the same
//! bytes may arrive twice, and the layers above must tolerate that.

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryBus, MemorySubscriber};
#[cfg(feature = "websocket")]
pub use websocket::{GatewaySubscriber, WebSocketGateway};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A lazy, unbounded sequence of raw messages from one subscription.
///
/// The returned futures are `Send` so the ingress loop can run inside a
/// spawned Tokio task.
pub trait Subscriber: Send + 'static {
    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the subscription has ended for good.
    fn next_message(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}

/// Hands raw bytes to a topic.
pub trait Publisher: Send + Sync + 'static {
    /// Publishes `data` on `topic`. One attempt; the caller decides
    /// what a failure means.
    fn publish(
        &self,
        topic: &str,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
