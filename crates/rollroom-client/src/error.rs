//! Error types for the client.

use rollroom_protocol::ProtocolError;
use tokio_tungstenite::tungstenite;

/// Errors returned by [`Client`](crate::Client).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The endpoint is not an http(s) or ws(s) URL.
    #[error("invalid endpoint {0:?}")]
    InvalidEndpoint(String),

    /// The server kept redirecting.
    #[error("too many redirects")]
    TooManyRedirects,

    /// The WebSocket connection failed.
    #[error("websocket error: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    /// The server sent a frame that could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}
