//! Client presence and authentication for Hearth.
//!
//! This crate owns the lifecycle of connected game clients:
//!
//! 1. **Session tracking**: who is connected, their latest state and
//!    presence status ([`SessionRegistry`], owned by a [`RegistryActor`])
//! 2. **Presence sweep**: forgetting clients that went silent
//!    ([`PresenceService`])
//! 3. **Authentication**: checking logins against the store
//!    ([`AuthGate`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← feeds the heartbeat and auth queues
//!     ↕
//! Session Layer (this crate)  ← one actor owns every session
//!     ↕
//! Protocol / Store (below)  ← payload types, credentials
//! ```
//!
//! All mutation of the session map happens inside the registry actor.
//! Other components hold a cloneable [`RegistryHandle`] and send it
//! commands.

mod actor;
mod auth;
mod error;
mod presence;
mod registry;
mod session;

pub use actor::{RegistryActor, RegistryHandle, registry};
pub use auth::{
    AuthGate, AuthOutcome, PasswordScheme, SALT_LEN, hash_password, hash_password_with_salt,
};
pub use error::SessionError;
pub use presence::{MIN_SWEEP_INTERVAL, PresenceService};
pub use registry::SessionRegistry;
pub use session::{Seen, Session, SessionConfig};
