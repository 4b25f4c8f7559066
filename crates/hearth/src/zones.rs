//! Zone service: answers zone queries from the document store.
//!
//! Zone documents are opaque here. The service only fetches them,
//! patches them, and publishes what the store returns.

use std::sync::Arc;

use hearth_protocol::{ClientId, Document, Envelope, Outbound, OutboundEnvelope};
use hearth_store::{Store, UpdateOutcome};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::worker::next_item;

/// A zone request, routed here by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneRequest {
    /// A client connected: send it every zone.
    Snapshot { client_id: ClientId },
    /// Send one zone.
    Fetch { client_id: ClientId, name: String },
    /// Patch one zone and send the result.
    Update {
        client_id: ClientId,
        name: String,
        patch: Document,
    },
}

impl ZoneRequest {
    /// The client that asked.
    pub fn client_id(&self) -> &ClientId {
        match self {
            Self::Snapshot { client_id }
            | Self::Fetch { client_id, .. }
            | Self::Update { client_id, .. } => client_id,
        }
    }
}

/// Consumes the zone queue and publishes the answers.
pub struct ZoneService<S> {
    store: Arc<S>,
    outbound: mpsc::Sender<OutboundEnvelope>,
}

impl<S: Store> ZoneService<S> {
    pub fn new(store: Arc<S>, outbound: mpsc::Sender<OutboundEnvelope>) -> Self {
        Self { store, outbound }
    }

    /// Computes the envelopes that answer `request`.
    ///
    /// Store failures become `error` envelopes; nothing here fails.
    /// Every envelope is addressed to the requesting client.
    pub async fn respond(&self, request: ZoneRequest) -> Vec<OutboundEnvelope> {
        let client_id = request.client_id().clone();
        let reply = |message: Outbound| Envelope::new(client_id.clone(), message);

        match request {
            ZoneRequest::Snapshot { .. } => match self.store.find_zones().await {
                Ok(zones) if zones.is_empty() => {
                    vec![reply(Outbound::Error("No zones found".into()))]
                }
                Ok(zones) => zones
                    .into_iter()
                    .map(|zone| reply(Outbound::UpdateZone(zone)))
                    .collect(),
                Err(e) => {
                    tracing::warn!(%client_id, error = %e, "zone snapshot failed");
                    vec![reply(Outbound::Error(format!("Unable to fetch zones: {e}")))]
                }
            },
            ZoneRequest::Fetch { name, .. } => match self.store.find_zone(&name).await {
                Ok(Some(zone)) => vec![reply(Outbound::Zone(zone))],
                Ok(None) => vec![reply(Outbound::Error(format!("No such zone '{name}'")))],
                Err(e) => {
                    tracing::warn!(%client_id, zone = %name, error = %e, "zone fetch failed");
                    vec![reply(Outbound::Error(format!("Unable to fetch zone: {e}")))]
                }
            },
            ZoneRequest::Update { name, patch, .. } => {
                match self.store.update_zone(&name, patch).await {
                    Ok(UpdateOutcome::Updated(zone)) => {
                        tracing::info!(%client_id, zone = %name, "zone updated");
                        vec![reply(Outbound::UpdateZone(zone))]
                    }
                    Ok(UpdateOutcome::NotFound) => {
                        vec![reply(Outbound::Error(format!("No such zone '{name}'")))]
                    }
                    Err(e) => {
                        tracing::warn!(%client_id, zone = %name, error = %e, "zone update failed");
                        vec![reply(Outbound::Error(format!("Unable to update zone: {e}")))]
                    }
                }
            }
        }
    }

    pub async fn run(self, mut requests: mpsc::Receiver<ZoneRequest>, cancel: CancellationToken) {
        tracing::info!("zone service started");

        'requests: while let Some(request) = next_item(&mut requests, &cancel).await {
            for envelope in self.respond(request).await {
                if self.outbound.send(envelope).await.is_err() {
                    tracing::debug!("outbound queue closed");
                    break 'requests;
                }
            }
        }

        tracing::info!("zone service stopped");
    }
}

#[cfg(test)]
mod tests {
    use hearth_store::{Credential, MemoryStore, StoreError};
    use serde_json::{Value, json};

    use super::*;

    struct DownStore;

    impl Store for DownStore {
        async fn find_credential(&self, _: &str) -> Result<Option<Credential>, StoreError> {
            Err(StoreError::Unavailable("timeout".into()))
        }
        async fn find_zones(&self) -> Result<Vec<Document>, StoreError> {
            Err(StoreError::Unavailable("timeout".into()))
        }
        async fn find_zone(&self, _: &str) -> Result<Option<Document>, StoreError> {
            Err(StoreError::Unavailable("timeout".into()))
        }
        async fn update_zone(&self, _: &str, _: Document) -> Result<UpdateOutcome, StoreError> {
            Err(StoreError::Unavailable("timeout".into()))
        }
    }

    fn service<S: Store>(store: S) -> ZoneService<S> {
        let (tx, _rx) = mpsc::channel(1);
        ZoneService::new(Arc::new(store), tx)
    }

    fn two_zones() -> MemoryStore {
        MemoryStore::from_json(r#"{ "zones": [ { "zone": "meadow" }, { "zone": "cave" } ] }"#)
            .unwrap()
    }

    fn alice() -> ClientId {
        ClientId::from("alice")
    }

    #[tokio::test]
    async fn test_respond_snapshot_one_update_per_zone() {
        let replies = service(two_zones())
            .respond(ZoneRequest::Snapshot { client_id: alice() })
            .await;

        assert_eq!(replies.len(), 2);
        for reply in &replies {
            assert_eq!(reply.client_id, alice());
            assert!(matches!(reply.message, Outbound::UpdateZone(_)));
        }
    }

    #[tokio::test]
    async fn test_respond_snapshot_no_zones_single_error() {
        let replies = service(MemoryStore::new())
            .respond(ZoneRequest::Snapshot { client_id: alice() })
            .await;

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].message, Outbound::Error("No zones found".into()));
    }

    #[tokio::test]
    async fn test_respond_snapshot_store_down_reports_error() {
        let replies = service(DownStore)
            .respond(ZoneRequest::Snapshot { client_id: alice() })
            .await;

        let Outbound::Error(text) = &replies[0].message else {
            panic!("expected error");
        };
        assert!(text.starts_with("Unable to fetch zones:"));
    }

    #[tokio::test]
    async fn test_respond_fetch_known_and_unknown() {
        let service = service(two_zones());

        let found = service
            .respond(ZoneRequest::Fetch {
                client_id: alice(),
                name: "cave".into(),
            })
            .await;
        let Outbound::Zone(zone) = &found[0].message else {
            panic!("expected zone");
        };
        assert_eq!(zone["zone"], "cave");

        let missing = service
            .respond(ZoneRequest::Fetch {
                client_id: alice(),
                name: "castle".into(),
            })
            .await;
        assert_eq!(
            missing[0].message,
            Outbound::Error("No such zone 'castle'".into())
        );
    }

    #[tokio::test]
    async fn test_respond_update_publishes_patched_document() {
        let Value::Object(patch) = json!({ "weather": "storm" }) else {
            unreachable!()
        };

        let replies = service(two_zones())
            .respond(ZoneRequest::Update {
                client_id: alice(),
                name: "meadow".into(),
                patch,
            })
            .await;

        let Outbound::UpdateZone(zone) = &replies[0].message else {
            panic!("expected updateZone");
        };
        assert_eq!(zone["weather"], "storm");
        assert!(zone.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn test_respond_update_unknown_zone_is_error() {
        let replies = service(two_zones())
            .respond(ZoneRequest::Update {
                client_id: alice(),
                name: "castle".into(),
                patch: Document::new(),
            })
            .await;

        assert!(matches!(replies[0].message, Outbound::Error(_)));
    }

    #[tokio::test]
    async fn test_run_publishes_to_outbound() {
        let (tx, mut rx) = mpsc::channel(8);
        let (req_tx, req_rx) = mpsc::channel(8);
        let service = ZoneService::new(Arc::new(two_zones()), tx);
        let task = tokio::spawn(service.run(req_rx, CancellationToken::new()));

        req_tx
            .send(ZoneRequest::Snapshot { client_id: alice() })
            .await
            .unwrap();
        drop(req_tx);
        task.await.unwrap();

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
