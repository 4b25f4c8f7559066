//! State service: records player state and republishes it.

use hearth_protocol::{Envelope, Outbound, OutboundEnvelope, PlayerState};
use hearth_session::{RegistryHandle, SessionError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::worker::next_item;

/// Consumes the state queue.
///
/// Each update is handed to the registry first, then echoed to every
/// client as a `playerState` envelope from the same sender.
pub struct StateService {
    registry: RegistryHandle,
    outbound: mpsc::Sender<OutboundEnvelope>,
}

impl StateService {
    pub fn new(registry: RegistryHandle, outbound: mpsc::Sender<OutboundEnvelope>) -> Self {
        Self { registry, outbound }
    }

    /// Records one update and returns the envelope to republish.
    ///
    /// # Errors
    /// [`SessionError::RegistryClosed`].
    pub async fn apply(&self, state: PlayerState) -> Result<OutboundEnvelope, SessionError> {
        let client_id = state.client_id.clone();
        self.registry.record_state(state.clone()).await?;
        Ok(Envelope::new(client_id, Outbound::PlayerState(state)))
    }

    pub async fn run(self, mut updates: mpsc::Receiver<PlayerState>, cancel: CancellationToken) {
        tracing::info!("state service started");

        while let Some(state) = next_item(&mut updates, &cancel).await {
            let envelope = match self.apply(state).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(error = %e, "state service stopping");
                    break;
                }
            };
            if self.outbound.send(envelope).await.is_err() {
                tracing::debug!("outbound queue closed");
                break;
            }
        }

        tracing::info!("state service stopped");
    }
}
