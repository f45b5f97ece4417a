//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes themselves were wrong: bad
//! framing, an unknown discriminant, or a payload that does not match its
//! declared shape. Connection and room failures live in other crates.

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Binary serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] bincode::Error),

    /// The binary frame does not match the shape its discriminant declares.
    #[error("decode failed: {0}")]
    Decode(#[source] bincode::Error),

    /// JSON serialization failed.
    #[cfg(feature = "json")]
    #[error("json encode failed: {0}")]
    JsonEncode(#[source] serde_json::Error),

    /// The JSON frame is malformed or does not match its declared shape.
    #[cfg(feature = "json")]
    #[error("json decode failed: {0}")]
    JsonDecode(#[source] serde_json::Error),

    /// The leading discriminant names no known envelope kind.
    ///
    /// Decoding stops here; the rest of the frame is never interpreted.
    #[error("unknown envelope kind {0}")]
    UnknownEnvelopeKind(u8),

    /// The frame is structurally unusable, e.g. empty.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
