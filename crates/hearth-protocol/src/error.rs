//! Error types for the protocol layer.
//!
//! Each crate in Hearth defines its own error enum. A `ProtocolError`
//! always means the bytes or the payload were wrong, never that a queue,
//! a socket, or the store misbehaved.

use crate::MessageType;

/// Errors that can occur while encoding or decoding envelopes.
///
/// Decoding happens in two stages (raw envelope first, then the typed
/// payload), and each stage has its own variant so the dispatcher can
/// log exactly why a message was discarded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The raw bytes are not a well-formed envelope.
    ///
    /// Common causes: malformed JSON, a missing `Type` field, or a
    /// truncated message.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope carries a type tag nobody understands.
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    /// The type tag is known but not valid in this direction,
    /// e.g. a client sending `playerHeartbeat` to the daemon.
    #[error("message type `{0}` is not accepted on this stream")]
    UnexpectedType(MessageType),

    /// The envelope decoded, but its payload does not have the shape
    /// required by its type tag.
    #[error("invalid `{kind}` payload: {source}")]
    Payload {
        /// The type tag whose payload failed to decode.
        kind: MessageType,
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}
