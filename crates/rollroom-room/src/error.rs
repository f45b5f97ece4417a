//! Error types for the room layer.

use rollroom_dice::DiceError;

/// Longest name echoed back in an error.
const MAX_ECHOED_CHARS: usize = 32;

/// Shortens an offending name for error messages and logs.
pub(crate) fn echo_name(name: &str) -> String {
    match name.char_indices().nth(MAX_ECHOED_CHARS) {
        Some((cut, _)) => format!("{}... ({} bytes)", &name[..cut], name.len()),
        None => name.to_string(),
    }
}

/// Errors returned by room and registry operations.
///
/// These go back to the caller only; they are never broadcast.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Room names must be non-empty and at most
    /// [`Room::MAX_NAME_BYTES`](crate::Room::MAX_NAME_BYTES) long.
    #[error("invalid room name {0:?}")]
    InvalidRoomName(String),

    /// User names must be non-empty and at most
    /// [`Room::MAX_USER_NAME_BYTES`](crate::Room::MAX_USER_NAME_BYTES) long.
    #[error("invalid user name {0:?}")]
    InvalidUserName(String),

    /// The requested roll is not valid dice notation.
    #[error("unknown roll spec: {0}")]
    UnknownRollSpec(#[from] DiceError),

    /// No result is recorded for this user.
    #[error("unknown user {0:?}")]
    UnknownUser(String),

    /// An attached session already uses this name.
    #[error("user name {0:?} is already taken in this room")]
    NameTaken(String),

    /// The room already holds [`Room::MAX_RESULTS`](crate::Room::MAX_RESULTS)
    /// results and `user` is not one of them.
    #[error("room {0:?} is full")]
    Full(String),

    /// The room lost its last session and no longer accepts joins.
    #[error("room {0:?} is closed")]
    Closed(String),
}
