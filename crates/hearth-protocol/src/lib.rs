//! Wire protocol for Hearth.
//!
//! This crate defines what travels on the pub/sub bus:
//!
//! - **Types** ([`ClientId`], [`MessageType`], [`PlayerState`], etc.):
//!   the payload structures carried in envelopes.
//! - **Envelopes** ([`Envelope`], [`Inbound`], [`Outbound`]): the
//!   tagged unions for each direction and the two-stage decode.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how raw envelopes are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong along the way.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw bytes) and the
//! dispatcher (typed work queues). It knows nothing about sessions,
//! stores, or sockets.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<Inbound>) → Dispatcher (queues)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod envelope;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, JsonCodec};
pub use envelope::{
    Envelope, Inbound, InboundEnvelope, Outbound, OutboundEnvelope, RawEnvelope, WireMessage,
};
pub use error::ProtocolError;
pub use types::{
    AuthRequest, ClientId, Document, HeartbeatPayload, HeartbeatRecord, MessageType, PlayerInfo,
    PlayerState, PresenceStatus, ZonePatch, ZoneQuery, unix_millis,
};
