//! # rollroom-client
//!
//! Connects to a rollroom server, joins a room, and follows its state.
//! Updates arrive as [`RoomView`](rollroom_protocol::RoomView) rows in
//! display order; snapshots older than the one already shown are dropped.

mod client;
mod error;

pub use client::{room_url, Client, MAX_REDIRECTS};
pub use error::ClientError;
