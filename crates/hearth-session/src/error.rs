//! Error types for the session layer.

use hearth_store::StoreError;

/// Errors that can occur in the session layer.
///
/// Failed logins are not errors: they are
/// [`AuthOutcome`](crate::AuthOutcome) values. These variants mean the
/// request could not be decided at all.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The registry actor has stopped, so its handle can't reach it.
    #[error("session registry is not running")]
    RegistryClosed,

    /// The credential lookup failed. The registry was not touched.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
