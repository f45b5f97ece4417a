//! Rooms and the registry that owns them.
//!
//! A [`Room`] holds the results of everyone who joined it and the roster of
//! sessions currently attached. Each mutation bumps the room's version and
//! hands a fresh [`RoomSnapshot`](rollroom_protocol::RoomSnapshot) to every
//! attached session's [`Outbox`].
//!
//! The [`Registry`] maps names to live rooms. Rooms are created on the first
//! join and removed when their last session detaches.
//!
//! ```text
//! Session ──join/toggle──▶ Room ──offer(snapshot)──▶ Outbox ─▶ Session
//!                           ▲
//!                 Registry ─┘ (name → Arc<Room>)
//! ```

mod config;
mod error;
mod outbox;
mod registry;
mod room;

pub use config::RoomConfig;
pub use error::RoomError;
pub use outbox::{outbox, Inbox, Outbox};
pub use registry::Registry;
pub use room::{JoinOutcome, Room, SessionId};
