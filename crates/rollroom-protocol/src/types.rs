//! Core protocol types for rollroom's wire format.
//!
//! Every frame on the wire is an [`Envelope`]: a discriminant
//! ([`EnvelopeKind`]), the wire-format revision, and one payload whose shape
//! is fixed by the discriminant.
//!
//! Payload structs are encoded positionally, so their field order IS the
//! wire layout. New fields may only be appended at the end; reordering or
//! removing a field breaks every deployed client.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Wire-format revision carried in every envelope.
///
/// This identifies the envelope layout, not a room's state generation.
pub const PROTOCOL_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// EnvelopeKind
// ---------------------------------------------------------------------------

/// The discriminant written as the first byte of every frame.
///
/// Values are part of the wire format and never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeKind {
    /// Server → Client: the full state of a room.
    StateSnapshot = 0,
    /// Client → Server: flip a user's done flag.
    ToggleDoneRequest = 1,
    /// Client → Server: the handshake, must be the first frame.
    JoinRequest = 2,
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::StateSnapshot),
            1 => Ok(Self::ToggleDoneRequest),
            2 => Ok(Self::JoinRequest),
            other => Err(ProtocolError::UnknownEnvelopeKind(other)),
        }
    }
}

impl From<EnvelopeKind> for u8 {
    fn from(kind: EnvelopeKind) -> Self {
        kind as u8
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateSnapshot => write!(f, "StateSnapshot"),
            Self::ToggleDoneRequest => write!(f, "ToggleDoneRequest"),
            Self::JoinRequest => write!(f, "JoinRequest"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Client → Server handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Display name, unique among the room's attached sessions.
    pub user: String,
    /// Dice notation for the room. Only used when the join creates the
    /// room; empty means "server default".
    pub roll: String,
}

/// Client → Server request to flip a user's done flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleDoneRequest {
    /// Whose flag to flip.
    pub user: String,
}

/// One user's outcome within a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// The user the roll belongs to.
    pub user: String,
    /// Join-order id, unique for the room's lifetime.
    pub id: u64,
    /// The rolled value.
    pub value: i64,
    /// Whether the user has marked themselves done.
    pub is_done: bool,
}

/// An immutable projection of a room at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    /// The room's state generation. Strictly increasing per room.
    pub version: u64,
    /// The room's name.
    pub name: String,
    /// Canonical dice notation the room rolls.
    pub roll_spec: String,
    /// Results ordered by value descending, ties by id ascending.
    pub results: Vec<RollResult>,
}

impl RoomSnapshot {
    /// Builds a snapshot, putting `results` into display order.
    pub fn new(
        version: u64,
        name: impl Into<String>,
        roll_spec: impl Into<String>,
        mut results: Vec<RollResult>,
    ) -> Self {
        results.sort_by(|a, b| b.value.cmp(&a.value).then(a.id.cmp(&b.id)));
        Self {
            version,
            name: name.into(),
            roll_spec: roll_spec.into(),
            results,
        }
    }

    /// Returns the result recorded for `user`, if any.
    pub fn result_for(&self, user: &str) -> Option<&RollResult> {
        self.results.iter().find(|r| r.user == user)
    }
}

/// The content of an envelope. The variant decides the [`EnvelopeKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// See [`JoinRequest`].
    Join(JoinRequest),
    /// See [`ToggleDoneRequest`].
    ToggleDone(ToggleDoneRequest),
    /// See [`RoomSnapshot`].
    Snapshot(RoomSnapshot),
}

impl Payload {
    /// The discriminant this payload is written with.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Join(_) => EnvelopeKind::JoinRequest,
            Self::ToggleDone(_) => EnvelopeKind::ToggleDoneRequest,
            Self::Snapshot(_) => EnvelopeKind::StateSnapshot,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level message wrapper. Every frame on the wire is an Envelope.
///
/// ```text
/// ┌──────────┬──────────────────┬───────────────────────────┐
/// │ kind: u8 │ protocol_version │ payload (shape from kind) │
/// └──────────┴──────────────────┴───────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Wire-format revision, see [`PROTOCOL_VERSION`].
    pub protocol_version: String,
    /// The message content.
    pub payload: Payload,
}

impl Envelope {
    /// Wraps `payload` with the current [`PROTOCOL_VERSION`].
    pub fn new(payload: Payload) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            payload,
        }
    }

    /// Shorthand for a join handshake.
    pub fn join(user: impl Into<String>, roll: impl Into<String>) -> Self {
        Self::new(Payload::Join(JoinRequest {
            user: user.into(),
            roll: roll.into(),
        }))
    }

    /// Shorthand for a done-toggle request.
    pub fn toggle_done(user: impl Into<String>) -> Self {
        Self::new(Payload::ToggleDone(ToggleDoneRequest { user: user.into() }))
    }

    /// Shorthand for a state push.
    pub fn snapshot(snapshot: RoomSnapshot) -> Self {
        Self::new(Payload::Snapshot(snapshot))
    }

    /// The envelope's discriminant.
    pub fn kind(&self) -> EnvelopeKind {
        self.payload.kind()
    }
}
