//! Codec trait and implementations for envelopes.
//!
//! Both codecs share one rule: the discriminant is read first, and an
//! unknown discriminant fails the whole frame before any payload byte is
//! looked at. Bytes after a complete payload are ignored, which leaves
//! room to append fields later.
//!
//! [`BinaryCodec`] is the wire format. [`JsonCodec`] writes the same three
//! positional parts as a JSON array and exists for debugging and tooling.

use bincode::Options;

use crate::types::{Envelope, EnvelopeKind, Payload};
use crate::ProtocolError;

/// Largest frame the binary codec will produce or accept.
///
/// Also caps the allocation a hostile length prefix can cause.
pub const MAX_FRAME_BYTES: u64 = 1 << 20;

/// Converts envelopes to bytes and back.
///
/// `Send + Sync + 'static` so one codec can be shared by every session
/// task behind an `Arc`.
pub trait Codec: Send + Sync + 'static {
    /// Serializes an envelope into one frame.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownEnvelopeKind`] when the discriminant
    /// is not recognized, and a decode error when the payload does not
    /// match the discriminant.
    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError>;
}

// ---------------------------------------------------------------------------
// BinaryCodec
// ---------------------------------------------------------------------------

/// The compact positional binary format.
///
/// ```text
/// [kind: u8][protocol_version: varint len + utf8][payload fields in order]
/// ```
///
/// Integers are varint encoded and little-endian; strings and sequences
/// carry a varint length prefix.
///
/// ```rust
/// use rollroom_protocol::{BinaryCodec, Codec, Envelope};
///
/// let codec = BinaryCodec;
/// let bytes = codec.encode(&Envelope::toggle_done("alice")).unwrap();
/// assert_eq!(bytes[0], 1);
/// assert_eq!(codec.decode(&bytes).unwrap(), Envelope::toggle_done("alice"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_FRAME_BYTES)
}

impl Codec for BinaryCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![u8::from(envelope.kind())];
        wire_options()
            .serialize_into(&mut buf, &envelope.protocol_version)
            .map_err(ProtocolError::Encode)?;
        match &envelope.payload {
            Payload::Join(p) => wire_options().serialize_into(&mut buf, p),
            Payload::ToggleDone(p) => wire_options().serialize_into(&mut buf, p),
            Payload::Snapshot(p) => wire_options().serialize_into(&mut buf, p),
        }
        .map_err(ProtocolError::Encode)?;
        Ok(buf)
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        let (&tag, mut rest) = data
            .split_first()
            .ok_or_else(|| ProtocolError::InvalidMessage("empty frame".into()))?;
        let kind = EnvelopeKind::try_from(tag)?;

        let protocol_version: String = wire_options()
            .deserialize_from(&mut rest)
            .map_err(ProtocolError::Decode)?;
        let payload = match kind {
            EnvelopeKind::StateSnapshot => Payload::Snapshot(
                wire_options()
                    .deserialize_from(&mut rest)
                    .map_err(ProtocolError::Decode)?,
            ),
            EnvelopeKind::ToggleDoneRequest => Payload::ToggleDone(
                wire_options()
                    .deserialize_from(&mut rest)
                    .map_err(ProtocolError::Decode)?,
            ),
            EnvelopeKind::JoinRequest => Payload::Join(
                wire_options()
                    .deserialize_from(&mut rest)
                    .map_err(ProtocolError::Decode)?,
            ),
        };

        Ok(Envelope {
            protocol_version,
            payload,
        })
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A JSON rendition of the binary layout: `[kind, protocol_version, payload]`.
///
/// Only behind the `json` feature (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
        let payload = match &envelope.payload {
            Payload::Join(p) => serde_json::to_value(p),
            Payload::ToggleDone(p) => serde_json::to_value(p),
            Payload::Snapshot(p) => serde_json::to_value(p),
        }
        .map_err(ProtocolError::JsonEncode)?;
        let frame = (u8::from(envelope.kind()), &envelope.protocol_version, payload);
        serde_json::to_vec(&frame).map_err(ProtocolError::JsonEncode)
    }

    fn decode(&self, data: &[u8]) -> Result<Envelope, ProtocolError> {
        use serde_json::Value;

        let value: Value =
            serde_json::from_slice(data).map_err(ProtocolError::JsonDecode)?;
        let mut parts = match value {
            Value::Array(parts) => parts.into_iter(),
            _ => {
                return Err(ProtocolError::InvalidMessage(
                    "json frame must be an array".into(),
                ));
            }
        };

        let tag = parts
            .next()
            .and_then(|v| v.as_u64())
            .ok_or_else(|| ProtocolError::InvalidMessage("missing kind".into()))?;
        let tag = u8::try_from(tag).map_err(|_| {
            ProtocolError::InvalidMessage(format!("kind {tag} out of range"))
        })?;
        let kind = EnvelopeKind::try_from(tag)?;

        let protocol_version = match parts.next() {
            Some(Value::String(v)) => v,
            _ => {
                return Err(ProtocolError::InvalidMessage(
                    "missing protocol version".into(),
                ));
            }
        };
        let body = parts.next().ok_or_else(|| {
            ProtocolError::InvalidMessage("missing payload".into())
        })?;
        let payload = match kind {
            EnvelopeKind::StateSnapshot => Payload::Snapshot(
                serde_json::from_value(body).map_err(ProtocolError::JsonDecode)?,
            ),
            EnvelopeKind::ToggleDoneRequest => Payload::ToggleDone(
                serde_json::from_value(body).map_err(ProtocolError::JsonDecode)?,
            ),
            EnvelopeKind::JoinRequest => Payload::Join(
                serde_json::from_value(body).map_err(ProtocolError::JsonDecode)?,
            ),
        };

        Ok(Envelope {
            protocol_version,
            payload,
        })
    }
}
