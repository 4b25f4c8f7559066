//! Broadcast relay: the single writer to the publish topic.

use hearth_protocol::{Codec, OutboundEnvelope};
use hearth_transport::Publisher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::HearthError;
use crate::worker::next_item;

/// Drains the outbound queue onto the broadcast topic, one envelope at a
/// time and in queue order.
pub struct BroadcastRelay<P, C> {
    publisher: P,
    codec: C,
    topic: String,
}

impl<P: Publisher, C: Codec> BroadcastRelay<P, C> {
    pub fn new(publisher: P, codec: C, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            codec,
            topic: topic.into(),
        }
    }

    /// The topic every envelope goes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encodes and publishes one envelope. No retry.
    ///
    /// # Errors
    /// `Protocol` if encoding fails, `Transport` if the publish does.
    pub async fn publish(&self, envelope: &OutboundEnvelope) -> Result<(), HearthError> {
        let bytes = envelope.encode(&self.codec)?;
        self.publisher.publish(&self.topic, &bytes).await?;
        Ok(())
    }

    /// Publishes until the queue closes or `cancel` fires. A failed
    /// publish loses that envelope and nothing else.
    pub async fn run(self, mut outbound: mpsc::Receiver<OutboundEnvelope>, cancel: CancellationToken) {
        tracing::info!(topic = %self.topic, "broadcast relay started");

        while let Some(envelope) = next_item(&mut outbound, &cancel).await {
            match self.publish(&envelope).await {
                Ok(()) => tracing::trace!(
                    client_id = %envelope.client_id,
                    kind = %envelope.kind(),
                    "published"
                ),
                Err(e) => tracing::warn!(
                    client_id = %envelope.client_id,
                    kind = %envelope.kind(),
                    error = %e,
                    "publish failed, envelope dropped"
                ),
            }
        }

        tracing::info!("broadcast relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use hearth_protocol::{ClientId, Envelope, JsonCodec, Outbound};
    use hearth_transport::{MemoryBus, Subscriber};
    use serde_json::Value;

    use super::*;

    fn error_for(id: &str, text: &str) -> OutboundEnvelope {
        Envelope::new(ClientId::from(id), Outbound::Error(text.into()))
    }

    #[tokio::test]
    async fn test_publish_writes_wire_envelope_to_topic() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("glc-gamestate");
        let relay = BroadcastRelay::new(bus.clone(), JsonCodec, "glc-gamestate");

        relay.publish(&error_for("alice", "No zones found")).await.unwrap();

        let bytes = sub.next_message().await.unwrap().unwrap();
        let wire: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(wire["ClientId"], "alice");
        assert_eq!(wire["Type"], "error");
        assert_eq!(wire["Data"], "No zones found");
    }

    #[tokio::test]
    async fn test_publish_closed_bus_is_transport_error() {
        let bus = MemoryBus::new();
        bus.close();
        let relay = BroadcastRelay::new(bus, JsonCodec, "glc-gamestate");

        let result = relay.publish(&error_for("a", "x")).await;

        assert!(matches!(result, Err(HearthError::Transport(_))));
    }

    #[tokio::test]
    async fn test_run_preserves_queue_order() {
        let bus = MemoryBus::new();
        let mut sub = bus.subscribe("out");
        let relay = BroadcastRelay::new(bus.clone(), JsonCodec, "out");
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(relay.run(rx, CancellationToken::new()));

        for n in 0..3 {
            tx.send(error_for("a", &n.to_string())).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        for n in 0..3 {
            let bytes = sub.try_next().unwrap();
            let wire: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(wire["Data"], n.to_string());
        }
    }

    #[tokio::test]
    async fn test_run_keeps_going_after_failed_publish() {
        let bus = MemoryBus::new();
        bus.close();
        let relay = BroadcastRelay::new(bus, JsonCodec, "out");
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(relay.run(rx, CancellationToken::new()));

        tx.send(error_for("a", "1")).await.unwrap();
        tx.send(error_for("a", "2")).await.unwrap();
        drop(tx);

        // Both failures are logged; the loop only ends when the queue does.
        task.await.unwrap();
    }
}
