//! Registry actor: the single task that owns the [`SessionRegistry`].
//!
//! The actor consumes the heartbeat queue directly and serves commands
//! from every other component through a bounded channel. No one else
//! ever touches the map, so mutation is serialized without locks.

use hearth_protocol::{
    ClientId, Envelope, HeartbeatRecord, Outbound, OutboundEnvelope, PlayerInfo, PlayerState,
};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{Seen, Session, SessionConfig, SessionError, SessionRegistry};

/// Commands sent to the registry actor.
///
/// Variants with a `reply` are request/response: the caller waits on the
/// oneshot for the actor's answer.
pub(crate) enum RegistryCommand {
    /// Store a state snapshot (fire-and-forget).
    RecordState { state: PlayerState },

    /// Flip a session's authenticated flag.
    MarkAuthenticated {
        client_id: ClientId,
        reply: oneshot::Sender<bool>,
    },

    /// List every known client.
    Roster {
        reply: oneshot::Sender<Vec<PlayerInfo>>,
    },

    /// Remove sessions last seen before `cutoff`.
    Sweep {
        cutoff: Instant,
        reply: oneshot::Sender<Vec<ClientId>>,
    },

    /// Copy out one session.
    Inspect {
        client_id: ClientId,
        reply: oneshot::Sender<Option<Session>>,
    },

    /// Count sessions.
    Len { reply: oneshot::Sender<usize> },
}

/// Handle to the running registry actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. Every method
/// fails with [`SessionError::RegistryClosed`] once the actor is gone.
#[derive(Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl RegistryHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::RegistryClosed)?;
        reply_rx.await.map_err(|_| SessionError::RegistryClosed)
    }

    /// Hands a state snapshot to the registry.
    pub async fn record_state(&self, state: PlayerState) -> Result<(), SessionError> {
        self.sender
            .send(RegistryCommand::RecordState { state })
            .await
            .map_err(|_| SessionError::RegistryClosed)
    }

    /// Marks `client_id` as authenticated. Returns whether a session
    /// existed to mark.
    pub async fn mark_authenticated(&self, client_id: &ClientId) -> Result<bool, SessionError> {
        let client_id = client_id.clone();
        self.request(|reply| RegistryCommand::MarkAuthenticated { client_id, reply })
            .await
    }

    /// Snapshot of every known client at the time the actor handles it.
    pub async fn roster(&self) -> Result<Vec<PlayerInfo>, SessionError> {
        self.request(|reply| RegistryCommand::Roster { reply }).await
    }

    /// Removes every session last seen strictly before `cutoff`.
    pub async fn sweep(&self, cutoff: Instant) -> Result<Vec<ClientId>, SessionError> {
        self.request(|reply| RegistryCommand::Sweep { cutoff, reply })
            .await
    }

    /// Returns a copy of one session, if it exists.
    pub async fn session(&self, client_id: &ClientId) -> Result<Option<Session>, SessionError> {
        let client_id = client_id.clone();
        self.request(|reply| RegistryCommand::Inspect { client_id, reply })
            .await
    }

    /// Number of live sessions.
    pub async fn len(&self) -> Result<usize, SessionError> {
        self.request(|reply| RegistryCommand::Len { reply }).await
    }
}

/// The registry actor. Build with [`registry`], then spawn [`run`](Self::run).
pub struct RegistryActor {
    registry: SessionRegistry,
    heartbeats: mpsc::Receiver<HeartbeatRecord>,
    commands: mpsc::Receiver<RegistryCommand>,
    outbound: mpsc::Sender<OutboundEnvelope>,
    state_refreshes_liveness: bool,
}

/// Most heartbeats the actor applies in a row while a command is waiting.
pub(crate) const HEARTBEAT_BURST: usize = 64;

/// Creates the registry actor and its handle.
///
/// - `heartbeats`: the heartbeat queue, consumed only by the actor.
/// - `outbound`: where presence-change notices are published.
///
/// A zero `command_capacity` is raised to 1.
pub fn registry(
    config: &SessionConfig,
    heartbeats: mpsc::Receiver<HeartbeatRecord>,
    outbound: mpsc::Sender<OutboundEnvelope>,
) -> (RegistryActor, RegistryHandle) {
    let (sender, commands) = mpsc::channel(config.command_capacity.max(1));
    let actor = RegistryActor {
        registry: SessionRegistry::new(),
        heartbeats,
        commands,
        outbound,
        state_refreshes_liveness: config.state_refreshes_liveness,
    };
    (actor, RegistryHandle { sender })
}

impl RegistryActor {
    /// Runs until cancelled or until either input queue closes.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("session registry started");

        let mut streak = 0;
        loop {
            // After a long run of heartbeats, let one waiting command in so
            // sweeps and queries are never starved.
            if streak >= HEARTBEAT_BURST {
                streak = 0;
                match self.commands.try_recv() {
                    Ok(command) => {
                        self.handle_command(command).await;
                        continue;
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        tracing::debug!("all registry handles dropped");
                        break;
                    }
                }
            }

            // Otherwise heartbeats already queued are applied before any
            // command that arrived after them.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                record = self.heartbeats.recv() => match record {
                    Some(record) => {
                        streak += 1;
                        self.handle_heartbeat(record).await;
                    }
                    None => {
                        tracing::debug!("heartbeat queue closed");
                        break;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => {
                        streak = 0;
                        self.handle_command(command).await;
                    }
                    None => {
                        tracing::debug!("all registry handles dropped");
                        break;
                    }
                },
            }
        }

        tracing::info!(sessions = self.registry.len(), "session registry stopped");
    }

    async fn handle_heartbeat(&mut self, record: HeartbeatRecord) {
        if let Some(change) = self.registry.apply_heartbeat(record, Instant::now()) {
            self.announce(change).await;
        }
    }

    async fn handle_command(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::RecordState { state } => {
                let refresh = self.state_refreshes_liveness.then(Seen::now);
                if let Some(change) = self.registry.record_state(state, refresh) {
                    self.announce(change).await;
                }
            }
            RegistryCommand::MarkAuthenticated { client_id, reply } => {
                let _ = reply.send(self.registry.mark_authenticated(&client_id));
            }
            RegistryCommand::Roster { reply } => {
                let _ = reply.send(self.registry.roster());
            }
            RegistryCommand::Sweep { cutoff, reply } => {
                let _ = reply.send(self.registry.expire(cutoff));
            }
            RegistryCommand::Inspect { client_id, reply } => {
                let _ = reply.send(self.registry.get(&client_id).cloned());
            }
            RegistryCommand::Len { reply } => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    /// Publishes a presence-change notice, addressed to its client.
    async fn announce(&self, record: HeartbeatRecord) {
        let envelope = Envelope::new(record.client_id.clone(), Outbound::PlayerHeartbeat(record));
        if self.outbound.send(envelope).await.is_err() {
            tracing::debug!("outbound queue closed, presence notice dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hearth_protocol::PresenceStatus;

    use super::*;

    struct Harness {
        handle: RegistryHandle,
        heartbeats: mpsc::Sender<HeartbeatRecord>,
        outbound: mpsc::Receiver<OutboundEnvelope>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<()>,
    }

    fn start(config: SessionConfig) -> Harness {
        let (hb_tx, hb_rx) = mpsc::channel(16);
        let (out_tx, out_rx) = mpsc::channel(16);
        let (actor, handle) = registry(&config, hb_rx, out_tx);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(actor.run(cancel.clone()));
        Harness {
            handle,
            heartbeats: hb_tx,
            outbound: out_rx,
            cancel,
            task,
        }
    }

    fn heartbeat(id: &str, status: PresenceStatus) -> HeartbeatRecord {
        HeartbeatRecord {
            client_id: ClientId::from(id),
            timestamp: 42,
            status,
        }
    }

    #[tokio::test]
    async fn test_registry_zero_command_capacity_still_serves() {
        let h = start(SessionConfig {
            command_capacity: 0,
            ..SessionConfig::default()
        });

        assert_eq!(h.handle.len().await.unwrap(), 0);
        h.cancel.cancel();
    }

    #[tokio::test]
    async fn test_run_heartbeat_flood_lets_waiting_command_through() {
        let flood = HEARTBEAT_BURST * 2;
        let (hb_tx, hb_rx) = mpsc::channel(flood);
        let (out_tx, _out_rx) = mpsc::channel(flood);
        let (actor, handle) = registry(&SessionConfig::default(), hb_rx, out_tx);
        for n in 0..flood {
            hb_tx
                .send(heartbeat(&format!("client-{n}"), PresenceStatus::Active))
                .await
                .unwrap();
        }
        let query = tokio::spawn({
            let handle = handle.clone();
            async move { handle.len().await }
        });
        // Let the query reach the command queue before the actor starts.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let cancel = CancellationToken::new();
        tokio::spawn(actor.run(cancel.clone()));

        let seen = query.await.unwrap().unwrap();

        assert_eq!(seen, HEARTBEAT_BURST);
        assert_eq!(handle.len().await.unwrap(), flood);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_heartbeat_creates_session_and_announces() {
        let mut h = start(SessionConfig::default());

        h.heartbeats
            .send(heartbeat("alice", PresenceStatus::Active))
            .await
            .unwrap();

        let notice = h.outbound.recv().await.unwrap();
        assert_eq!(notice.client_id, ClientId::from("alice"));
        assert_eq!(
            notice.message,
            Outbound::PlayerHeartbeat(heartbeat("alice", PresenceStatus::Active))
        );
        assert_eq!(h.handle.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_quit_announces_quit_and_removes() {
        let mut h = start(SessionConfig::default());
        h.heartbeats
            .send(heartbeat("alice", PresenceStatus::Active))
            .await
            .unwrap();
        h.outbound.recv().await.unwrap();

        h.heartbeats
            .send(heartbeat("alice", PresenceStatus::Quit))
            .await
            .unwrap();

        let notice = h.outbound.recv().await.unwrap();
        let Outbound::PlayerHeartbeat(record) = notice.message else {
            panic!("expected presence notice");
        };
        assert!(record.status.is_quit());
        assert_eq!(h.handle.session(&ClientId::from("alice")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_record_state_default_does_not_create_session() {
        let mut h = start(SessionConfig::default());

        h.handle
            .record_state(PlayerState {
                client_id: ClientId::from("bob"),
                ..PlayerState::default()
            })
            .await
            .unwrap();

        assert_eq!(h.handle.len().await.unwrap(), 0);
        assert!(h.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_record_state_refreshing_liveness_creates_and_announces() {
        let config = SessionConfig {
            state_refreshes_liveness: true,
            ..SessionConfig::default()
        };
        let mut h = start(config);

        h.handle
            .record_state(PlayerState {
                client_id: ClientId::from("bob"),
                ..PlayerState::default()
            })
            .await
            .unwrap();

        let notice = h.outbound.recv().await.unwrap();
        assert_eq!(notice.client_id, ClientId::from("bob"));
        assert_eq!(h.handle.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sweep_reaches_actor() {
        let h = start(SessionConfig::default());
        h.heartbeats
            .send(heartbeat("alice", PresenceStatus::Active))
            .await
            .unwrap();
        // Make sure the heartbeat was applied before sweeping.
        assert_eq!(h.handle.len().await.unwrap(), 1);

        let expired = h
            .handle
            .sweep(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(expired, vec![ClientId::from("alice")]);
    }

    #[tokio::test]
    async fn test_handle_after_cancel_returns_registry_closed() {
        let h = start(SessionConfig::default());

        h.cancel.cancel();
        h.task.await.unwrap();

        assert!(matches!(
            h.handle.roster().await,
            Err(SessionError::RegistryClosed)
        ));
    }
}
