//! Per-connection sessions for rollroom.
//!
//! A session binds one connection to one room. It owns the join handshake,
//! reads the peer's requests, and is the only writer of the room's
//! snapshots to that peer.
//!
//! ```text
//! Connection ──recv──▶ inbound loop ──toggle_done──▶ Room
//!      ▲                                              │
//!      └──send── outbound loop ◀──Inbox◀──offer──────┘
//! ```
//!
//! One slow or dead peer only ever affects its own session: the room hands
//! off snapshots without waiting, and each session writes at its own pace.

mod cancel;
mod config;
mod error;
mod session;

pub use cancel::Cancellation;
pub use config::SessionConfig;
pub use error::SessionError;
pub use session::{run_session, SessionContext};
