//! In-process topic bus.
//!
//! Each [`MemoryBus::subscribe`] call registers a new subscriber on a
//! topic; every publish on that topic is copied to every subscriber that
//! is still alive. Cloning the bus is cheap and shares the same topics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::{Publisher, Subscriber, TransportError};

type Topics = HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>;

#[derive(Default)]
struct Shared {
    topics: Mutex<Topics>,
    closed: AtomicBool,
}

/// An in-process publish/subscribe bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    shared: Arc<Shared>,
}

impl MemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `topic`. Only messages published after this call
    /// are delivered.
    pub fn subscribe(&self, topic: &str) -> MemorySubscriber {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.is_closed() {
            self.topics().entry(topic.to_string()).or_default().push(tx);
        }
        MemorySubscriber {
            topic: topic.to_string(),
            rx,
        }
    }

    /// Closes the bus: every subscription ends and later publishes fail
    /// with [`TransportError::Closed`].
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.topics().clear();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn topics(&self) -> std::sync::MutexGuard<'_, Topics> {
        self.shared
            .topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Publisher for MemoryBus {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut topics = self.topics();
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|tx| tx.send(data.to_vec()).is_ok());
        }
        Ok(())
    }
}

/// One subscription on a [`MemoryBus`] topic.
#[derive(Debug)]
pub struct MemorySubscriber {
    topic: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemorySubscriber {
    /// The topic this subscriber listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the next message if one is already queued.
    pub fn try_next(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

impl Subscriber for MemorySubscriber {
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.rx.recv().await)
    }
}
