//! `HearthServer` builder and supervisor.
//!
//! Ties the layers together: transport → dispatcher → per-type workers →
//! outbound queue → relay → transport. Every worker is a Tokio task owned
//! by one `JoinSet`.

use std::future::Future;
use std::sync::Arc;

use hearth_protocol::{AuthRequest, ClientId, Codec, JsonCodec, OutboundEnvelope, PlayerState};
use hearth_session::{
    AuthGate, PasswordScheme, PresenceService, RegistryActor, RegistryHandle, SessionConfig,
    registry,
};
use hearth_store::Store;
use hearth_transport::{Publisher, Subscriber};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    BroadcastRelay, Dispatcher, HearthConfig, HearthError, Queues, RosterService, StateService,
    ZoneRequest, ZoneService,
};

/// Builder for configuring a Hearth server.
///
/// # Example
///
/// ```rust,ignore
/// let server = HearthServerBuilder::new()
///     .publish_topic("glc-gamestate")
///     .build(subscriber, publisher, Arc::new(store));
/// server.run(cancel).await
/// ```
pub struct HearthServerBuilder<C = JsonCodec> {
    codec: C,
    session_config: SessionConfig,
    scheme: PasswordScheme,
    queue_capacity: usize,
    publish_topic: String,
}

impl HearthServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&HearthConfig::default())
    }

    /// Takes every setting from a loaded config. A zero queue capacity
    /// is raised to 1, as with [`queue_capacity`](Self::queue_capacity).
    pub fn from_config(config: &HearthConfig) -> Self {
        Self {
            codec: JsonCodec,
            session_config: config.session_config(),
            scheme: config.auth.scheme,
            queue_capacity: config.dispatch.queue_capacity.max(1),
            publish_topic: config.transport.publish_topic.clone(),
        }
    }
}

impl Default for HearthServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec + Clone> HearthServerBuilder<C> {
    /// Swaps the wire codec used on both topics.
    pub fn codec<C2: Codec + Clone>(self, codec: C2) -> HearthServerBuilder<C2> {
        HearthServerBuilder {
            codec,
            session_config: self.session_config,
            scheme: self.scheme,
            queue_capacity: self.queue_capacity,
            publish_topic: self.publish_topic,
        }
    }

    /// Presence timings and registry capacity. Zero values are raised to
    /// their minimums when the registry and sweep are built.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn password_scheme(mut self, scheme: PasswordScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Capacity of each work queue. Clamped to at least 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn publish_topic(mut self, topic: impl Into<String>) -> Self {
        self.publish_topic = topic.into();
        self
    }

    /// Wires every component. Nothing runs until [`HearthServer::run`].
    pub fn build<Sub, P, S>(
        self,
        subscriber: Sub,
        publisher: P,
        store: Arc<S>,
    ) -> HearthServer<Sub, P, S, C>
    where
        Sub: Subscriber,
        P: Publisher,
        S: Store,
    {
        let capacity = self.queue_capacity;
        let (state_tx, state_rx) = mpsc::channel(capacity);
        let (heartbeat_tx, heartbeat_rx) = mpsc::channel(capacity);
        let (auth_tx, auth_rx) = mpsc::channel(capacity);
        let (roster_tx, roster_rx) = mpsc::channel(capacity);
        let (zone_tx, zone_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

        let (registry_actor, registry_handle) =
            registry(&self.session_config, heartbeat_rx, outbound_tx.clone());

        let queues = Queues {
            state: state_tx,
            heartbeat: heartbeat_tx,
            auth: auth_tx,
            roster: roster_tx,
            zone: zone_tx,
            outbound: outbound_tx.clone(),
        };

        HearthServer {
            subscriber,
            dispatcher: Dispatcher::new(self.codec.clone(), queues),
            registry_actor,
            registry: registry_handle.clone(),
            presence: PresenceService::new(registry_handle.clone(), &self.session_config),
            auth: AuthGate::new(Arc::clone(&store), registry_handle.clone(), self.scheme),
            state: StateService::new(registry_handle.clone(), outbound_tx.clone()),
            roster: RosterService::new(registry_handle, outbound_tx.clone()),
            zones: ZoneService::new(store, outbound_tx),
            relay: BroadcastRelay::new(publisher, self.codec, self.publish_topic),
            inputs: Inputs {
                state: state_rx,
                auth: auth_rx,
                roster: roster_rx,
                zone: zone_rx,
                outbound: outbound_rx,
            },
        }
    }
}

/// Receiving ends of the queues, handed to their consumers at startup.
struct Inputs {
    state: mpsc::Receiver<PlayerState>,
    auth: mpsc::Receiver<AuthRequest>,
    roster: mpsc::Receiver<ClientId>,
    zone: mpsc::Receiver<ZoneRequest>,
    outbound: mpsc::Receiver<OutboundEnvelope>,
}

/// A fully wired Hearth daemon.
///
/// Call [`run()`](Self::run) to start every worker.
pub struct HearthServer<Sub, P, S, C = JsonCodec> {
    subscriber: Sub,
    dispatcher: Dispatcher<C>,
    registry_actor: RegistryActor,
    registry: RegistryHandle,
    presence: PresenceService,
    auth: AuthGate<S>,
    state: StateService,
    roster: RosterService,
    zones: ZoneService<S>,
    relay: BroadcastRelay<P, C>,
    inputs: Inputs,
}

impl<Sub, P, S, C> HearthServer<Sub, P, S, C>
where
    Sub: Subscriber,
    P: Publisher,
    S: Store,
    C: Codec,
{
    /// A handle to the session registry, valid while the server runs.
    pub fn registry(&self) -> RegistryHandle {
        self.registry.clone()
    }

    /// Runs every worker until `cancel` fires or any worker stops, then
    /// stops the rest and waits for them.
    ///
    /// # Errors
    /// [`HearthError::Worker`] if a worker panicked.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), HearthError> {
        let shutdown = cancel.child_token();
        let Self {
            subscriber,
            dispatcher,
            registry_actor,
            registry: _,
            presence,
            auth,
            state,
            roster,
            zones,
            relay,
            inputs,
        } = self;

        let mut workers = JoinSet::new();
        spawn(&mut workers, "registry", registry_actor.run(shutdown.child_token()));
        spawn(&mut workers, "presence", presence.run(shutdown.child_token()));
        spawn(&mut workers, "auth", auth.run(inputs.auth, shutdown.child_token()));
        spawn(&mut workers, "state", state.run(inputs.state, shutdown.child_token()));
        spawn(&mut workers, "roster", roster.run(inputs.roster, shutdown.child_token()));
        spawn(&mut workers, "zones", zones.run(inputs.zone, shutdown.child_token()));
        spawn(&mut workers, "relay", relay.run(inputs.outbound, shutdown.child_token()));
        spawn(&mut workers, "dispatcher", dispatcher.run(subscriber, shutdown.child_token()));

        tracing::info!(workers = workers.len(), "Hearth server running");

        let first = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("shutdown requested");
                None
            }
            joined = workers.join_next() => joined,
        };
        shutdown.cancel();

        let mut result = Ok(());
        if let Some(joined) = first {
            record(&mut result, joined);
        }
        while let Some(joined) = workers.join_next().await {
            record(&mut result, joined);
        }

        tracing::info!("Hearth server stopped");
        result
    }
}

fn spawn<F>(workers: &mut JoinSet<&'static str>, name: &'static str, worker: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    workers.spawn(async move {
        worker.await;
        name
    });
}

fn record(
    result: &mut Result<(), HearthError>,
    joined: Result<&'static str, tokio::task::JoinError>,
) {
    match joined {
        Ok(name) => tracing::debug!(worker = name, "worker exited"),
        Err(e) => {
            tracing::error!(error = %e, "worker failed");
            if result.is_ok() {
                *result = Err(HearthError::Worker(e));
            }
        }
    }
}
