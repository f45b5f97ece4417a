//! Wire protocol for rollroom.
//!
//! - **Types** ([`Envelope`], [`EnvelopeKind`], [`RoomSnapshot`], ...):
//!   the messages that travel between clients and the server.
//! - **Codecs** ([`Codec`], [`BinaryCodec`], [`JsonCodec`]): how those
//!   messages become frames.
//! - **View** ([`RoomView`]): how a client folds pushed snapshots into the
//!   state it displays.
//!
//! The protocol knows nothing about connections or rooms.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session (room membership)
//! ```

mod codec;
mod error;
mod types;
mod view;

pub use codec::{BinaryCodec, Codec, MAX_FRAME_BYTES};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, EnvelopeKind, JoinRequest, Payload, PROTOCOL_VERSION, RollResult,
    RoomSnapshot, ToggleDoneRequest,
};
pub use view::RoomView;
