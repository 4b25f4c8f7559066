//! Authentication gate: checks logins against the store.
//!
//! Hearth doesn't own user accounts. Credentials live in the document
//! store's `users` collection, and the gate only answers one question:
//! does this name/password pair match what is stored?
//!
//! A successful login flips the authenticated flag on the session with
//! the same name, if there is one. A failed login changes nothing and
//! never creates a session. No outcome publishes anything; they are all
//! just logged.
//!
//! # Password schemes
//!
//! How stored secrets are compared is a [`PasswordScheme`]:
//!
//! - `plain` (default): the stored secret is the password itself and
//!   must match exactly.
//! - `salted-sha512`: the stored secret is hex of a 32-byte random salt
//!   followed by hex of `SHA-512(salt ‖ password)`. Use [`hash_password`]
//!   to produce one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hearth_protocol::{AuthRequest, ClientId};
use hearth_store::Store;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{RegistryHandle, SessionError};

/// Salt length, in bytes, for [`PasswordScheme::SaltedSha512`].
pub const SALT_LEN: usize = 32;

// ---------------------------------------------------------------------------
// AuthOutcome
// ---------------------------------------------------------------------------

/// The verdict on one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Name and password match the stored credential.
    Authenticated,
    /// The user exists but the password is wrong.
    Rejected,
    /// No credential is stored under that name.
    UnknownUser,
}

impl fmt::Display for AuthOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Authenticated => "authenticated",
            Self::Rejected => "rejected",
            Self::UnknownUser => "unknown user",
        })
    }
}

// ---------------------------------------------------------------------------
// PasswordScheme
// ---------------------------------------------------------------------------

/// How stored secrets are compared against candidate passwords.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordScheme {
    #[default]
    Plain,
    SaltedSha512,
}

impl PasswordScheme {
    /// Returns `true` if `candidate` matches the `stored` secret.
    ///
    /// A stored value that isn't valid for the scheme (bad hex, short
    /// salt) never matches.
    pub fn verify(&self, stored: &str, candidate: &str) -> bool {
        match self {
            Self::Plain => stored == candidate,
            Self::SaltedSha512 => {
                let Ok(bytes) = hex::decode(stored) else {
                    return false;
                };
                if bytes.len() <= SALT_LEN {
                    return false;
                }
                let (salt, digest) = bytes.split_at(SALT_LEN);
                salted_digest(salt, candidate).as_slice() == digest
            }
        }
    }
}

impl fmt::Display for PasswordScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::SaltedSha512 => "salted-sha512",
        })
    }
}

impl FromStr for PasswordScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(Self::Plain),
            "salted-sha512" => Ok(Self::SaltedSha512),
            other => Err(format!(
                "unknown password scheme `{other}` (expected `plain` or `salted-sha512`)"
            )),
        }
    }
}

fn salted_digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

/// Produces a `salted-sha512` secret for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::rng().random();
    hash_password_with_salt(password, &salt)
}

/// Like [`hash_password`], with a caller-chosen salt.
pub fn hash_password_with_salt(password: &str, salt: &[u8; SALT_LEN]) -> String {
    let mut out = hex::encode(salt);
    out.push_str(&hex::encode(salted_digest(salt, password)));
    out
}

// ---------------------------------------------------------------------------
// AuthGate
// ---------------------------------------------------------------------------

/// Validates logins and marks sessions authenticated.
///
/// The store is shared read-only with the zone service; the registry is
/// reached only through its handle, and only after the store lookup has
/// finished.
pub struct AuthGate<S> {
    store: Arc<S>,
    registry: RegistryHandle,
    scheme: PasswordScheme,
}

impl<S: Store> AuthGate<S> {
    pub fn new(store: Arc<S>, registry: RegistryHandle, scheme: PasswordScheme) -> Self {
        Self {
            store,
            registry,
            scheme,
        }
    }

    /// Decides one login attempt.
    ///
    /// # Errors
    /// - `SessionError::Store` if the credential lookup failed (registry untouched)
    /// - `SessionError::RegistryClosed` if the registry is gone
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<AuthOutcome, SessionError> {
        let name = request.name.as_str();

        let Some(credential) = self.store.find_credential(name).await? else {
            tracing::info!(name, "login for unknown user");
            return Ok(AuthOutcome::UnknownUser);
        };

        if !self.scheme.verify(&credential.password, &request.password) {
            tracing::info!(name, "login rejected");
            return Ok(AuthOutcome::Rejected);
        }

        let marked = self
            .registry
            .mark_authenticated(&ClientId::from(name))
            .await?;
        tracing::info!(name, session = marked, "login accepted");
        Ok(AuthOutcome::Authenticated)
    }

    /// Consumes the authentication queue until cancelled or it closes.
    ///
    /// A failed request is logged and skipped; the loop carries on.
    pub async fn run(self, mut requests: mpsc::Receiver<AuthRequest>, cancel: CancellationToken) {
        tracing::info!(scheme = %self.scheme, "authentication gate started");

        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => request,
                    None => break,
                },
            };

            match self.authenticate(&request).await {
                Ok(_) => {}
                Err(SessionError::RegistryClosed) => {
                    tracing::warn!("registry gone, authentication gate stopping");
                    break;
                }
                Err(e) => {
                    tracing::warn!(name = %request.name, error = %e, "login aborted");
                }
            }
        }

        tracing::info!("authentication gate stopped");
    }
}
