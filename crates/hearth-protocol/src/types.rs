//! Core protocol types for Hearth's wire format.
//!
//! Everything in this module travels "on the wire": it is serialized to
//! JSON, published on the bus, and parsed by game clients. Field names
//! are PascalCase because that is what the deployed clients already
//! send and expect.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};

use crate::ProtocolError;

/// A loosely-typed JSON object, used for zone documents and patches.
pub type Document = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The identifier a game client stamps on every envelope it sends.
///
/// Clients pick their own ids (in practice, the player's login name), so
/// this is a string rather than a server-assigned number. It may be empty
/// on server-originated envelopes.
///
/// `#[serde(transparent)]` makes `ClientId("alice")` serialize as plain
/// `"alice"`.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty id (no sender).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// Every type tag Hearth knows about, in either direction.
///
/// Which tags are accepted depends on the stream: see
/// [`Inbound`](crate::Inbound) and [`Outbound`](crate::Outbound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Client liveness signal, optionally carrying a presence status.
    Heartbeat,
    /// Player position/avatar update.
    PlayerState,
    /// Login attempt.
    PlayerAuth,
    /// Roster request (inbound) or roster reply (outbound).
    Knock,
    /// Chat line, relayed as-is.
    Chat,
    /// A client finished connecting and wants the world layout.
    Connected,
    /// Arbitrary payload relayed as-is.
    Broadcast,
    /// Presence-change notification emitted by the registry.
    PlayerHeartbeat,
    /// Human-readable error text.
    Error,
    /// Zone document (outbound) or zone patch request (inbound).
    UpdateZone,
    /// Single zone document (outbound) or zone lookup (inbound).
    Zone,
}

impl MessageType {
    /// The tag as it appears in the envelope's `Type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::PlayerState => "playerState",
            Self::PlayerAuth => "playerAuth",
            Self::Knock => "knock",
            Self::Chat => "chat",
            Self::Connected => "connected",
            Self::Broadcast => "broadcast",
            Self::PlayerHeartbeat => "playerHeartbeat",
            Self::Error => "error",
            Self::UpdateZone => "updateZone",
            Self::Zone => "zone",
        }
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Ok(match tag {
            "heartbeat" => Self::Heartbeat,
            "playerState" => Self::PlayerState,
            "playerAuth" => Self::PlayerAuth,
            "knock" => Self::Knock,
            "chat" => Self::Chat,
            "connected" => Self::Connected,
            "broadcast" => Self::Broadcast,
            "playerHeartbeat" | "presence" => Self::PlayerHeartbeat,
            "error" => Self::Error,
            "updateZone" => Self::UpdateZone,
            "zone" => Self::Zone,
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PresenceStatus
// ---------------------------------------------------------------------------

/// What a client says it is doing, carried on heartbeats.
///
/// The set is open: clients invent statuses, so anything unrecognised is
/// kept verbatim in [`PresenceStatus::Custom`]. `QUIT` is special: it
/// ends the session.
///
/// On the wire this is a plain string. Parsing is case-insensitive and an
/// empty or missing status means [`PresenceStatus::Active`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PresenceStatus {
    /// Connected and playing (also the status of a bare heartbeat).
    #[default]
    Active,
    /// Connected but idle.
    Idle,
    /// Stepped away.
    Away,
    /// Typing in chat.
    Typing,
    /// Leaving for good. Never stored on a session.
    Quit,
    /// Any other client-defined status.
    Custom(String),
}

impl PresenceStatus {
    /// Returns `true` for [`PresenceStatus::Quit`].
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Quit)
    }
}

impl From<String> for PresenceStatus {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "" | "ACTIVE" => Self::Active,
            "IDLE" => Self::Idle,
            "AWAY" => Self::Away,
            "TYPING" => Self::Typing,
            "QUIT" => Self::Quit,
            _ => Self::Custom(trimmed.to_string()),
        }
    }
}

impl From<PresenceStatus> for String {
    fn from(status: PresenceStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("ACTIVE"),
            Self::Idle => f.write_str("IDLE"),
            Self::Away => f.write_str("AWAY"),
            Self::Typing => f.write_str("TYPING"),
            Self::Quit => f.write_str("QUIT"),
            Self::Custom(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// A player's position and avatar, sent by clients and relayed to all.
///
/// Coordinates default to zero when omitted, matching how older clients
/// behave when they only send avatar changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerState {
    /// Overwritten with the envelope's client id on ingestion.
    #[serde(default)]
    pub client_id: ClientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_state: Option<i64>,
}

/// Payload of an inbound `heartbeat`. The sender comes from the envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(
        rename = "Status",
        alias = "status",
        default,
        deserialize_with = "status_or_active"
    )]
    pub status: PresenceStatus,
}

// Clients send `"Status": null` when they have nothing to report.
fn status_or_active<'de, D>(deserializer: D) -> Result<PresenceStatus, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(PresenceStatus::from)
        .unwrap_or_default())
}

/// One processed heartbeat: who, when, and with what status.
///
/// Built by the dispatcher, consumed once by the session registry, and
/// echoed back out as the payload of `playerHeartbeat` notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeartbeatRecord {
    pub client_id: ClientId,
    /// Unix time in milliseconds when the daemon received the heartbeat.
    pub timestamp: u64,
    #[serde(default)]
    pub status: PresenceStatus,
}

/// Current Unix time in milliseconds, the unit of every wire timestamp.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// A login attempt: candidate name and password.
///
/// Older clients sent lowercase keys, newer ones PascalCase, so both
/// spellings are accepted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "Name", alias = "name", alias = "user")]
    pub name: String,
    #[serde(rename = "Password", alias = "password")]
    pub password: String,
}

// Hand-written so passwords never end up in logs.
impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One entry of a roster (`knock`) reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerInfo {
    pub client_id: ClientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Inbound `zone`: fetch one zone document by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneQuery {
    #[serde(rename = "Name", alias = "name", alias = "zone")]
    pub name: String,
}

/// Inbound `updateZone`: merge `patch` into the named zone document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePatch {
    #[serde(rename = "Name", alias = "name", alias = "zone")]
    pub name: String,
    #[serde(rename = "Patch", alias = "patch", default)]
    pub patch: Document,
}

// =========================================================================
// Tests
// =========================================================================
