//! Unified error type for rollroom.

use rollroom_dice::DiceError;
use rollroom_protocol::ProtocolError;
use rollroom_room::RoomError;
use rollroom_session::SessionError;
use rollroom_transport::TransportError;

/// Wraps every crate-specific error so callers of the `rollroom` crate can
/// use one type with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RollroomError {
    /// Listening, accepting, or connection I/O failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session ended abnormally.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room or registry operation was rejected.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Dice notation was invalid.
    #[error(transparent)]
    Dice(#[from] DiceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err: RollroomError =
            TransportError::HandshakeFailed("bad request".into()).into();
        assert!(matches!(err, RollroomError::Transport(_)));
        assert!(err.to_string().contains("bad request"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err: RollroomError = ProtocolError::UnknownEnvelopeKind(9).into();
        assert!(matches!(err, RollroomError::Protocol(_)));
        assert_eq!(err.to_string(), "unknown envelope kind 9");
    }

    #[test]
    fn test_from_session_error() {
        let err: RollroomError =
            SessionError::ProtocolViolation("second join".into()).into();
        assert!(matches!(err, RollroomError::Session(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err: RollroomError = RoomError::UnknownUser("ghost".into()).into();
        assert!(matches!(err, RollroomError::Room(_)));
    }

    #[test]
    fn test_from_dice_error() {
        let err: RollroomError = DiceError::Syntax("d".into()).into();
        assert!(matches!(err, RollroomError::Dice(_)));
    }
}
