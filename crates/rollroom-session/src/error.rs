//! Error types for the session layer.

use rollroom_protocol::ProtocolError;
use rollroom_room::RoomError;
use rollroom_transport::TransportError;

/// Why a session ended early or never started.
///
/// Every variant ends exactly one session. None of them is reported to the
/// peer; the connection is simply closed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer sent a frame that is not allowed at this point.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Reading or writing the connection failed.
    #[error("connection error: {0}")]
    Connection(#[from] TransportError),

    /// No JoinRequest arrived in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// The peer hung up before joining.
    #[error("connection closed before join")]
    ClosedBeforeJoin,

    /// The room refused the join.
    #[error("join rejected: {0}")]
    Join(#[from] RoomError),
}
