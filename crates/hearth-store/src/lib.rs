//! Persistence seam for Hearth.
//!
//! The daemon reads credentials and zone documents from a document
//! store but never owns its layout. Two collections matter:
//!
//! - `users`: `{ "user": <name>, "password": <secret> }`
//! - `zones`: opaque objects, looked up by their `"zone"` field
//!
//! [`Store`] is the trait the session and zone services call;
//! [`MemoryStore`] is an in-process implementation that can be seeded
//! from a JSON file.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{MemoryStore, Seed};

use std::fmt;
use std::future::Future;

use hearth_protocol::Document;
use serde::{Deserialize, Serialize};

/// Field that names a zone document.
pub const ZONE_KEY: &str = "zone";

/// Field stamped with the unix-millisecond time of the last update.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// A stored login: user name plus the secret to check against.
///
/// The secret's format depends on the configured password scheme
/// (plain text, or a salted hash).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub user: String,
    pub password: String,
}

impl Credential {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of [`Store::update_zone`].
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The zone existed; here is the document after the patch.
    Updated(Document),
    /// No zone with that name.
    NotFound,
}

/// A document store holding credentials and zones.
///
/// # Trait bounds
///
/// - `Send + Sync` → one store is shared (behind an `Arc`) by the
///   authentication gate and the zone service, each in its own task.
/// - Returned futures are `Send` so they can be awaited inside spawned
///   tasks.
pub trait Store: Send + Sync + 'static {
    /// Looks up the credential stored for `name`.
    ///
    /// `Ok(None)` means the user does not exist.
    fn find_credential(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Credential>, StoreError>> + Send;

    /// Returns every zone document.
    fn find_zones(&self) -> impl Future<Output = Result<Vec<Document>, StoreError>> + Send;

    /// Returns the zone document named `name`, if any.
    fn find_zone(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Merges `patch` into the top level of the zone named `name` and
    /// stamps it with the current time.
    fn update_zone(
        &self,
        name: &str,
        patch: Document,
    ) -> impl Future<Output = Result<UpdateOutcome, StoreError>> + Send;
}
