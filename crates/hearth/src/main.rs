//! hearthd: the Hearth presence daemon.
//!
//! Serves the read and publish topics over a WebSocket gateway: every
//! frame a client sends is an inbound envelope, and every outbound
//! envelope goes to every connected client.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hearth::{CliOverrides, HearthConfig, HearthError, HearthServerBuilder};
use hearth_session::PasswordScheme;
use hearth_store::MemoryStore;
use hearth_transport::WebSocketGateway;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// hearthd: presence and message routing for game clients
#[derive(Parser, Debug)]
#[command(name = "hearthd", version, about = "Presence and message-routing daemon")]
struct Cli {
    /// Config file path (TOML). Missing file means defaults.
    #[arg(long, default_value = "hearth.toml")]
    config: PathBuf,

    /// Address the WebSocket gateway listens on
    #[arg(long)]
    listen: Option<String>,

    /// Topic outbound envelopes are published on
    #[arg(long)]
    publish_topic: Option<String>,

    /// JSON seed file with users and zones
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Seconds between presence sweeps
    #[arg(long)]
    sweep_interval: Option<u64>,

    /// Seconds of silence before a client is forgotten
    #[arg(long)]
    expiry: Option<u64>,

    /// Count state updates as a sign of life
    #[arg(long)]
    state_refreshes_liveness: bool,

    /// How stored passwords are compared (plain, salted-sha512)
    #[arg(long)]
    password_scheme: Option<PasswordScheme>,

    /// Capacity of each work queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            listen: self.listen.clone(),
            publish_topic: self.publish_topic.clone(),
            seed: self.seed.clone(),
            sweep_interval_secs: self.sweep_interval,
            expiry_secs: self.expiry,
            state_refreshes_liveness: self.state_refreshes_liveness,
            scheme: self.password_scheme,
            queue_capacity: self.queue_capacity,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting hearthd");

    if let Err(e) = run(cli).await {
        error!(error = %e, "hearthd failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), HearthError> {
    let config = cli
        .overrides()
        .apply(HearthConfig::load(Some(&cli.config))?)
        .validated()?;

    let store = match &config.store.seed {
        Some(path) => {
            let store = MemoryStore::load(path)?;
            info!(
                path = %path.display(),
                users = store.user_count(),
                zones = store.zone_count(),
                "store seeded"
            );
            store
        }
        None => {
            info!("no seed file, store starts empty");
            MemoryStore::new()
        }
    };

    let (gateway, inbound) = WebSocketGateway::bind(&config.transport.listen).await?;
    info!(
        addr = %gateway.local_addr(),
        publish_topic = %config.transport.publish_topic,
        "gateway ready"
    );

    let server = HearthServerBuilder::from_config(&config).build(inbound, gateway, Arc::new(store));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C, shutting down"),
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
        }
        on_signal.cancel();
    });

    server.run(cancel).await
}
