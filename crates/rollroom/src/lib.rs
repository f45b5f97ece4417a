//! # rollroom
//!
//! Real-time dice rooms. Clients connect to `ws://host:port/<room>`, join
//! with a name, get a roll, and then see every change to the room as a
//! versioned snapshot.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rollroom::prelude::*;
//!
//! # async fn start() -> Result<(), RollroomError> {
//! let server = Server::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod server;

pub use error::RollroomError;
pub use server::{room_from_path, Server, ServerBuilder};

pub use rollroom_dice as dice;
pub use rollroom_protocol as protocol;
pub use rollroom_room as room;
pub use rollroom_session as session;
pub use rollroom_transport as transport;

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{RollroomError, Server, ServerBuilder};
    pub use rollroom_dice::{DiceRoll, RandomRoller, Roller};
    pub use rollroom_protocol::{RollResult, RoomSnapshot};
    pub use rollroom_room::{Registry, RoomConfig};
    pub use rollroom_session::SessionConfig;
}
