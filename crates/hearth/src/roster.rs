//! Roster service: answers `knock` with the list of known players.

use hearth_protocol::{ClientId, Envelope, Outbound, OutboundEnvelope};
use hearth_session::{RegistryHandle, SessionError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::worker::next_item;

pub struct RosterService {
    registry: RegistryHandle,
    outbound: mpsc::Sender<OutboundEnvelope>,
}

impl RosterService {
    pub fn new(registry: RegistryHandle, outbound: mpsc::Sender<OutboundEnvelope>) -> Self {
        Self { registry, outbound }
    }

    /// Builds the `knock` reply for `requester`: every session the
    /// registry holds, addressed to the requester.
    ///
    /// # Errors
    /// [`SessionError::RegistryClosed`].
    pub async fn respond(&self, requester: ClientId) -> Result<OutboundEnvelope, SessionError> {
        let roster = self.registry.roster().await?;
        tracing::debug!(%requester, players = roster.len(), "roster requested");
        Ok(Envelope::new(requester, Outbound::Knock(roster)))
    }

    pub async fn run(self, mut requests: mpsc::Receiver<ClientId>, cancel: CancellationToken) {
        tracing::info!("roster service started");

        while let Some(requester) = next_item(&mut requests, &cancel).await {
            let reply = match self.respond(requester).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "roster service stopping");
                    break;
                }
            };
            if self.outbound.send(reply).await.is_err() {
                tracing::debug!("outbound queue closed");
                break;
            }
        }

        tracing::info!("roster service stopped");
    }
}
