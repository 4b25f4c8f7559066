//! Codec trait and implementations for turning wire structures into bytes.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The envelope layer doesn't care HOW a raw envelope is serialized, it
//! just needs something that implements the [`Codec`] trait.
//!
//! Currently we provide [`JsonCodec`], which matches what existing game
//! clients put on the bus.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between the dispatcher and relay
///   tasks, which Tokio may run on any thread of its pool.
/// - `'static` → the codec owns everything it needs, so it can live
///   inside long-lived worker tasks.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means the result doesn't
/// borrow from the input bytes. The transport buffer can be dropped as
/// soon as decoding finishes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use hearth_protocol::{ClientId, Envelope, JsonCodec, Outbound};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::new(ClientId::from("alice"), Outbound::Error("boom".into()));
///
/// let bytes = envelope.encode(&codec).unwrap();
/// let decoded: Envelope<Outbound> = Envelope::decode(&codec, &bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
