//! The client connection.

use futures_util::{SinkExt, StreamExt};
use rollroom_protocol::{
    BinaryCodec, Codec, Envelope, Payload, RollResult, RoomView,
};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::http::{header, Uri};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::ClientError;

/// Redirects followed before giving up.
pub const MAX_REDIRECTS: usize = 3;

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A connection to one room on a rollroom server.
///
/// ```rust,no_run
/// use rollroom_client::Client;
///
/// # async fn play() -> Result<(), rollroom_client::ClientError> {
/// let mut client = Client::connect("http://localhost:8080", "tavern", "alice").await?;
/// client.join("1d20").await?;
/// while let Some(rows) = client.next_update().await? {
///     for row in &rows {
///         println!("{:>10} {:>4} {}", row.user, row.value, row.is_done);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Client {
    ws: Ws,
    user: String,
    view: RoomView,
    codec: BinaryCodec,
}

impl Client {
    /// Connects to `room` on the server at `endpoint`.
    ///
    /// `http`/`ws` endpoints use `ws`, `https`/`wss` use `wss`. Up to
    /// [`MAX_REDIRECTS`] redirects are followed.
    pub async fn connect(
        endpoint: &str,
        room: &str,
        user: &str,
    ) -> Result<Self, ClientError> {
        let mut url = room_url(endpoint, room)?;

        for _ in 0..=MAX_REDIRECTS {
            tracing::debug!(%url, "connecting");
            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    return Ok(Self {
                        ws,
                        user: user.to_string(),
                        view: RoomView::new(),
                        codec: BinaryCodec,
                    });
                }
                Err(tungstenite::Error::Http(resp))
                    if resp.status().is_redirection() =>
                {
                    let location = resp
                        .headers()
                        .get(header::LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .ok_or_else(|| {
                            ClientError::InvalidEndpoint(format!(
                                "{} redirect without location",
                                resp.status()
                            ))
                        })?;
                    url = redirect_target(&url, location)?;
                    tracing::debug!(%url, "redirected");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ClientError::TooManyRedirects)
    }

    /// The user this client joins and toggles as.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Sends the join handshake. An empty `roll` uses the server default.
    pub async fn join(&mut self, roll: &str) -> Result<(), ClientError> {
        self.send(&Envelope::join(self.user.clone(), roll)).await
    }

    /// Flips this client's done flag.
    pub async fn toggle_done(&mut self) -> Result<(), ClientError> {
        self.send(&Envelope::toggle_done(self.user.clone())).await
    }

    /// Waits for the next snapshot that moves the view forward and returns
    /// its rows in display order.
    ///
    /// Stale snapshots and non-binary frames are skipped. Returns `None`
    /// once the server closes the connection.
    pub async fn next_update(
        &mut self,
    ) -> Result<Option<Vec<RollResult>>, ClientError> {
        while let Some(msg) = self.ws.next().await {
            let data = match msg {
                Ok(Message::Binary(data)) => data,
                Ok(Message::Close(_)) => return Ok(None),
                Ok(_) => continue,
                Err(tungstenite::Error::ConnectionClosed) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            match self.codec.decode(&data)?.payload {
                Payload::Snapshot(snapshot) => {
                    let version = snapshot.version;
                    if self.view.apply(snapshot) {
                        return Ok(Some(self.view.results().to_vec()));
                    }
                    tracing::debug!(version, "stale snapshot skipped");
                }
                other => {
                    tracing::debug!(kind = %other.kind(), "ignoring frame");
                }
            }
        }
        Ok(None)
    }

    /// The latest state received.
    pub fn view(&self) -> &RoomView {
        &self.view
    }

    /// Sends a normal close frame.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.ws.close(None).await?;
        Ok(())
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), ClientError> {
        let bytes = self.codec.encode(envelope)?;
        self.ws.send(Message::Binary(bytes.into())).await?;
        Ok(())
    }
}

fn ws_scheme(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" | "ws" => Some("ws"),
        "https" | "wss" => Some("wss"),
        _ => None,
    }
}

/// Builds `ws(s)://host[:port]/<room>` from a server endpoint.
pub fn room_url(endpoint: &str, room: &str) -> Result<String, ClientError> {
    let invalid = || ClientError::InvalidEndpoint(endpoint.to_string());
    let uri: Uri = endpoint.parse().map_err(|_| invalid())?;
    let scheme = uri.scheme_str().and_then(ws_scheme).ok_or_else(invalid)?;
    let authority = uri.authority().ok_or_else(invalid)?;
    Ok(format!("{scheme}://{authority}/{room}"))
}

/// Resolves a `Location` header against the URL that produced it.
fn redirect_target(current: &str, location: &str) -> Result<String, ClientError> {
    let invalid = || ClientError::InvalidEndpoint(location.to_string());
    let current: Uri = current.parse().map_err(|_| invalid())?;
    let target: Uri = location.parse().map_err(|_| invalid())?;

    let scheme = match target.scheme_str() {
        Some(s) => ws_scheme(s).ok_or_else(invalid)?,
        None => current.scheme_str().and_then(ws_scheme).unwrap_or("ws"),
    };
    let authority = target
        .authority()
        .or(current.authority())
        .ok_or_else(invalid)?;
    let path = target.path_and_query().map_or("/", |p| p.as_str());
    Ok(format!("{scheme}://{authority}{path}"))
}
