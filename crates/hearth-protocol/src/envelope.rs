//! Envelopes: the unit that travels on the bus.
//!
//! On the wire an envelope is a flat JSON object:
//!
//! ```text
//! { "ClientId": "alice", "Type": "playerState", "Data": { "X": 1.5, "Y": 2 } }
//! ```
//!
//! Decoding is two-stage. First the byte [`Codec`] parses the raw
//! envelope, keeping `Data` as generic JSON. Then the type tag picks
//! exactly one decode path for the payload, producing a variant of the
//! [`Inbound`] or [`Outbound`] tagged union. Anything that fails either
//! stage becomes a typed [`ProtocolError`] and never reaches a consumer.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    AuthRequest, ClientId, Codec, Document, HeartbeatPayload, HeartbeatRecord, MessageType,
    PlayerInfo, PlayerState, ProtocolError, ZonePatch, ZoneQuery,
};

// ---------------------------------------------------------------------------
// Raw wire shape
// ---------------------------------------------------------------------------

/// The envelope exactly as serialized, before the payload is typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "ClientId", default)]
    pub client_id: ClientId,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Data", default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Typed messages
// ---------------------------------------------------------------------------

/// A message type that can be carried inside an [`Envelope`].
///
/// Implemented by the two direction-specific unions. Each knows its own
/// tag, how to turn itself into generic JSON, and how to decode a
/// payload for a given tag.
pub trait WireMessage: Sized {
    /// The type tag written into the envelope.
    fn kind(&self) -> MessageType;

    /// Converts the payload into generic JSON.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the payload can't be represented.
    fn to_data(&self) -> Result<Value, ProtocolError>;

    /// Decodes the payload for `kind`.
    ///
    /// # Errors
    /// - `ProtocolError::UnexpectedType` if `kind` is not valid here
    /// - `ProtocolError::Payload` if `data` has the wrong shape
    fn from_data(kind: MessageType, data: Value) -> Result<Self, ProtocolError>;
}

/// Messages the daemon reads from its inbound topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Heartbeat(HeartbeatPayload),
    PlayerState(PlayerState),
    PlayerAuth(AuthRequest),
    Knock,
    Chat(Value),
    Connected,
    Broadcast(Value),
    Zone(ZoneQuery),
    UpdateZone(ZonePatch),
}

/// Messages the daemon publishes on its outbound topic.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    PlayerState(PlayerState),
    PlayerHeartbeat(HeartbeatRecord),
    /// Roster reply, addressed to the client that knocked.
    Knock(Vec<PlayerInfo>),
    Error(String),
    UpdateZone(Document),
    Zone(Document),
    Chat(Value),
    Broadcast(Value),
}

/// Decodes a typed payload, tagging any failure with the message type.
///
/// A missing/null `Data` is treated as an empty object, so payloads whose
/// fields are all optional still decode.
fn payload<T: DeserializeOwned>(kind: MessageType, data: Value) -> Result<T, ProtocolError> {
    let data = match data {
        Value::Null => Value::Object(Document::new()),
        other => other,
    };
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload { kind, source })
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(ProtocolError::Encode)
}

impl WireMessage for Inbound {
    fn kind(&self) -> MessageType {
        match self {
            Self::Heartbeat(_) => MessageType::Heartbeat,
            Self::PlayerState(_) => MessageType::PlayerState,
            Self::PlayerAuth(_) => MessageType::PlayerAuth,
            Self::Knock => MessageType::Knock,
            Self::Chat(_) => MessageType::Chat,
            Self::Connected => MessageType::Connected,
            Self::Broadcast(_) => MessageType::Broadcast,
            Self::Zone(_) => MessageType::Zone,
            Self::UpdateZone(_) => MessageType::UpdateZone,
        }
    }

    fn to_data(&self) -> Result<Value, ProtocolError> {
        match self {
            Self::Heartbeat(p) => to_value(p),
            Self::PlayerState(p) => to_value(p),
            Self::PlayerAuth(p) => to_value(p),
            Self::Knock | Self::Connected => Ok(Value::Null),
            Self::Chat(v) | Self::Broadcast(v) => Ok(v.clone()),
            Self::Zone(p) => to_value(p),
            Self::UpdateZone(p) => to_value(p),
        }
    }

    fn from_data(kind: MessageType, data: Value) -> Result<Self, ProtocolError> {
        Ok(match kind {
            MessageType::Heartbeat => Self::Heartbeat(payload(kind, data)?),
            MessageType::PlayerState => Self::PlayerState(payload(kind, data)?),
            MessageType::PlayerAuth => Self::PlayerAuth(payload(kind, data)?),
            // Knock and connected carry no payload; whatever is there is ignored.
            MessageType::Knock => Self::Knock,
            MessageType::Connected => Self::Connected,
            MessageType::Chat => Self::Chat(data),
            MessageType::Broadcast => Self::Broadcast(data),
            MessageType::Zone => Self::Zone(payload(kind, data)?),
            MessageType::UpdateZone => Self::UpdateZone(payload(kind, data)?),
            MessageType::PlayerHeartbeat | MessageType::Error => {
                return Err(ProtocolError::UnexpectedType(kind));
            }
        })
    }
}

impl WireMessage for Outbound {
    fn kind(&self) -> MessageType {
        match self {
            Self::PlayerState(_) => MessageType::PlayerState,
            Self::PlayerHeartbeat(_) => MessageType::PlayerHeartbeat,
            Self::Knock(_) => MessageType::Knock,
            Self::Error(_) => MessageType::Error,
            Self::UpdateZone(_) => MessageType::UpdateZone,
            Self::Zone(_) => MessageType::Zone,
            Self::Chat(_) => MessageType::Chat,
            Self::Broadcast(_) => MessageType::Broadcast,
        }
    }

    fn to_data(&self) -> Result<Value, ProtocolError> {
        match self {
            Self::PlayerState(p) => to_value(p),
            Self::PlayerHeartbeat(p) => to_value(p),
            Self::Knock(players) => to_value(players),
            Self::Error(text) => Ok(Value::String(text.clone())),
            Self::UpdateZone(doc) | Self::Zone(doc) => Ok(Value::Object(doc.clone())),
            Self::Chat(v) | Self::Broadcast(v) => Ok(v.clone()),
        }
    }

    fn from_data(kind: MessageType, data: Value) -> Result<Self, ProtocolError> {
        Ok(match kind {
            MessageType::PlayerState => Self::PlayerState(payload(kind, data)?),
            MessageType::PlayerHeartbeat => Self::PlayerHeartbeat(payload(kind, data)?),
            MessageType::Knock => Self::Knock(payload(kind, data)?),
            MessageType::Error => Self::Error(payload(kind, data)?),
            MessageType::UpdateZone => Self::UpdateZone(payload(kind, data)?),
            MessageType::Zone => Self::Zone(payload(kind, data)?),
            MessageType::Chat => Self::Chat(data),
            MessageType::Broadcast => Self::Broadcast(data),
            MessageType::Heartbeat | MessageType::PlayerAuth | MessageType::Connected => {
                return Err(ProtocolError::UnexpectedType(kind));
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A typed envelope: who sent it (or who it is for) plus the message.
///
/// Think of it like a postal envelope: the client id on the outside,
/// and a typed letter inside.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    /// Sender for inbound envelopes, addressee (or empty) for outbound ones.
    pub client_id: ClientId,
    pub message: M,
}

impl<M: WireMessage> Envelope<M> {
    /// Wraps a message in an envelope.
    pub fn new(client_id: ClientId, message: M) -> Self {
        Self { client_id, message }
    }

    /// The envelope's type tag.
    pub fn kind(&self) -> MessageType {
        self.message.kind()
    }

    /// Types a raw envelope.
    ///
    /// # Errors
    /// `UnknownType`, `UnexpectedType`, or `Payload`.
    pub fn from_raw(raw: RawEnvelope) -> Result<Self, ProtocolError> {
        let kind: MessageType = raw.kind.parse()?;
        let message = M::from_data(kind, raw.data)?;
        Ok(Self {
            client_id: raw.client_id,
            message,
        })
    }

    /// Converts to the raw wire shape.
    ///
    /// # Errors
    /// `ProtocolError::Encode` if the payload can't be represented.
    pub fn to_raw(&self) -> Result<RawEnvelope, ProtocolError> {
        Ok(RawEnvelope {
            client_id: self.client_id.clone(),
            kind: self.kind().as_str().to_string(),
            data: self.message.to_data()?,
        })
    }

    /// Decodes bytes into a typed envelope (both stages).
    ///
    /// # Errors
    /// Any [`ProtocolError`]; the caller should log and drop the message.
    pub fn decode<C: Codec>(codec: &C, bytes: &[u8]) -> Result<Self, ProtocolError> {
        let raw: RawEnvelope = codec.decode(bytes)?;
        Self::from_raw(raw)
    }

    /// Encodes the envelope into bytes.
    ///
    /// # Errors
    /// `ProtocolError::Encode`.
    pub fn encode<C: Codec>(&self, codec: &C) -> Result<Vec<u8>, ProtocolError> {
        codec.encode(&self.to_raw()?)
    }
}

/// An envelope read from the inbound topic.
pub type InboundEnvelope = Envelope<Inbound>;

/// An envelope headed for the outbound topic.
pub type OutboundEnvelope = Envelope<Outbound>;

// =========================================================================
// Tests
// =========================================================================
