//! # Hearth
//!
//! Presence and message-routing daemon for multiplayer game backends.
//!
//! Clients publish small JSON envelopes on a read topic. Hearth decodes
//! each one, routes it by type to a dedicated worker, and publishes the
//! results (presence changes, state echoes, rosters, zone documents) on a
//! single broadcast topic that every client listens to.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hearth::prelude::*;
//!
//! # async fn run() -> Result<(), HearthError> {
//! let bus = MemoryBus::new();
//! let store = Arc::new(MemoryStore::new());
//! let server = HearthServerBuilder::new().build(bus.subscribe("glc-daemon"), bus.clone(), store);
//! server.run(CancellationToken::new()).await
//! # }
//! ```

mod config;
mod dispatcher;
mod error;
mod relay;
mod roster;
mod server;
mod state;
mod worker;
mod zones;

pub use config::{
    AuthSection, CliOverrides, DispatchSection, HearthConfig, PresenceSection, StoreSection,
    TransportSection,
};
pub use dispatcher::{Dispatcher, Queues, Route};
pub use error::{DispatchError, HearthError};
pub use relay::BroadcastRelay;
pub use roster::RosterService;
pub use server::{HearthServer, HearthServerBuilder};
pub use state::StateService;
pub use zones::{ZoneRequest, ZoneService};

/// Convenience re-exports for embedding Hearth.
///
/// ```rust
/// use hearth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{HearthConfig, HearthError, HearthServer, HearthServerBuilder};
    pub use hearth_protocol::{
        ClientId, Envelope, Inbound, JsonCodec, MessageType, Outbound, PlayerState,
        PresenceStatus,
    };
    pub use hearth_session::{PasswordScheme, RegistryHandle, SessionConfig};
    pub use hearth_store::{MemoryStore, Store};
    pub use hearth_transport::{MemoryBus, Publisher, Subscriber};
    pub use tokio_util::sync::CancellationToken;
}
