//! Unified error types for Hearth.

use std::path::PathBuf;

use hearth_protocol::{MessageType, ProtocolError};
use hearth_session::SessionError;
use hearth_store::StoreError;
use hearth_transport::TransportError;

use crate::Route;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    /// A transport-level error (bind, publish).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (registry gone, credential lookup failed).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A store-level error (seed file, backend failure).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML of the expected shape.
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A config value is out of range.
    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    /// A worker task panicked.
    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Why the dispatcher dropped an inbound envelope.
///
/// None of these are fatal: the dispatcher logs the error and moves on
/// to the next message.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The bytes didn't decode into a known, well-formed envelope.
    #[error("undecodable envelope: {0}")]
    Decode(#[from] ProtocolError),

    /// The message type needs a sender id and the envelope had none.
    #[error("`{0}` envelope without a client id")]
    MissingClientId(MessageType),

    /// The destination queue is saturated; only this envelope is lost.
    #[error("{0} queue is full")]
    QueueFull(Route),

    /// The destination worker has stopped.
    #[error("{0} queue is closed")]
    QueueClosed(Route),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: HearthError = TransportError::Closed.into();
        assert!(matches!(err, HearthError::Transport(_)));
        assert_eq!(err.to_string(), "transport closed");
    }

    #[test]
    fn test_from_session_error() {
        let err: HearthError = SessionError::RegistryClosed.into();
        assert!(matches!(err, HearthError::Session(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err: HearthError = StoreError::UnnamedZone.into();
        assert!(matches!(err, HearthError::Store(_)));
    }

    #[test]
    fn test_dispatch_error_names_the_queue() {
        let err = DispatchError::QueueFull(Route::Heartbeat);
        assert_eq!(err.to_string(), "heartbeat queue is full");
    }
}
