//! The presence sweep: a timer that expires silent sessions.

use std::time::Duration;

use hearth_protocol::ClientId;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{RegistryHandle, SessionConfig, SessionError};

/// Shortest sweep period. A zero interval in the config is raised to this.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Periodically asks the registry to drop clients that went quiet.
///
/// Every `sweep_interval` the service takes the current time `T` and
/// removes every session last seen before `T - expiry`. Expired clients
/// are removed silently; only an explicit `QUIT` is ever announced.
pub struct PresenceService {
    registry: RegistryHandle,
    interval: Duration,
    expiry: Duration,
}

impl PresenceService {
    pub fn new(registry: RegistryHandle, config: &SessionConfig) -> Self {
        Self {
            registry,
            interval: config.sweep_interval.max(MIN_SWEEP_INTERVAL),
            expiry: config.expiry,
        }
    }

    /// Runs one sweep now. Returns the expired client ids.
    ///
    /// # Errors
    /// [`SessionError::RegistryClosed`] if the registry is gone.
    pub async fn sweep_once(&self) -> Result<Vec<ClientId>, SessionError> {
        // Before `expiry` has elapsed on the clock nobody can be stale yet.
        let Some(cutoff) = Instant::now().checked_sub(self.expiry) else {
            return Ok(Vec::new());
        };
        let expired = self.registry.sweep(cutoff).await?;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired silent sessions");
            for client_id in &expired {
                tracing::debug!(%client_id, "session expired");
            }
        }
        Ok(expired)
    }

    /// Sweeps on a fixed interval until cancelled or the registry stops.
    ///
    /// The first sweep happens one full interval after start. If sweeps
    /// fall behind (e.g. a stalled runtime), missed ticks are skipped
    /// rather than bunched up.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            expiry_ms = self.expiry.as_millis() as u64,
            "presence sweep started"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        tracing::warn!(error = %e, "presence sweep stopping");
                        break;
                    }
                }
            }
        }

        tracing::info!("presence sweep stopped");
    }
}
