//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The listener runs in its own task. Every TCP connection is upgraded in a
//! separate task so a client that stalls mid-handshake never delays the
//! next accept. Upgraded connections are queued for [`Transport::accept`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Path answered with a plain `200 ok` instead of a WebSocket upgrade.
pub const HEALTH_PATH: &str = "/health";

const HEALTH_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
content-type: text/plain\r\n\
content-length: 2\r\n\
connection: close\r\n\
\r\n\
ok";

/// Upper bound on how much of a health probe request is drained.
const MAX_PROBE_BYTES: usize = 8 * 1024;

/// Time a new TCP connection gets to finish its upgrade or health probe.
pub const DEFAULT_UPGRADE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgraded connections waiting for `accept()`.
const PENDING_CONNECTIONS: usize = 128;

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    ///
    /// Use port `0` to let the OS pick one, then read it back with
    /// [`local_addr`](Self::local_addr).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_timeout(addr, DEFAULT_UPGRADE_TIMEOUT).await
    }

    /// Binds like [`bind`](Self::bind). Connections that have not
    /// completed the upgrade within `upgrade_timeout` are dropped.
    pub async fn bind_with_timeout(
        addr: &str,
        upgrade_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, incoming) = mpsc::channel(PENDING_CONNECTIONS);
        let acceptor =
            tokio::spawn(accept_loop(listener, tx, upgrade_timeout));

        Ok(Self {
            local_addr,
            incoming,
            acceptor,
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.acceptor.abort();
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    tx: mpsc::Sender<WebSocketConnection>,
    upgrade_timeout: Duration,
) {
    while !tx.is_closed() {
        let (stream, addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "TCP accept failed");
                continue;
            }
        };

        let tx = tx.clone();
        tokio::spawn(async move {
            let upgraded =
                tokio::time::timeout(upgrade_timeout, upgrade(stream)).await;
            match upgraded {
                Err(_) => {
                    tracing::debug!(%addr, "upgrade timed out");
                }
                Ok(Ok(Some(conn))) => {
                    tracing::debug!(
                        id = %conn.id,
                        %addr,
                        path = %conn.path,
                        "accepted WebSocket connection"
                    );
                    let _ = tx.send(conn).await;
                }
                Ok(Ok(None)) => {
                    tracing::debug!(%addr, "answered health probe");
                }
                Ok(Err(e)) => {
                    tracing::debug!(%addr, error = %e, "upgrade failed");
                }
            }
        });
    }
}

/// Upgrades a TCP stream, or answers it directly if it is a health probe.
async fn upgrade(
    mut stream: TcpStream,
) -> Result<Option<WebSocketConnection>, TransportError> {
    if is_health_probe(&stream).await? {
        answer_health_probe(&mut stream).await?;
        return Ok(None);
    }

    let mut path = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| {
            path = req.uri().path().to_string();
            Ok::<_, ErrorResponse>(resp)
        },
    )
    .await
    .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

    let id = ConnectionId::new(
        NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
    );
    let (sink, stream) = ws.split();

    Ok(Some(WebSocketConnection {
        id,
        path,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    }))
}

async fn is_health_probe(stream: &TcpStream) -> Result<bool, TransportError> {
    let mut buf = [0u8; 32];
    let n = stream
        .peek(&mut buf)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    let line = &buf[..n];
    let target = format!("GET {HEALTH_PATH}");
    Ok(line.starts_with(target.as_bytes())
        && matches!(line.get(target.len()), Some(b' ' | b'?')))
}

async fn answer_health_probe(
    stream: &mut TcpStream,
) -> Result<(), TransportError> {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n")
        && request.len() < MAX_PROBE_BYTES
    {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..n]);
    }

    stream
        .write_all(HEALTH_RESPONSE)
        .await
        .map_err(TransportError::SendFailed)?;
    stream.shutdown().await.map_err(TransportError::SendFailed)
}

/// A single WebSocket connection.
///
/// The read and write halves sit behind separate locks, so a task parked in
/// [`recv`](Connection::recv) never blocks another task's
/// [`send`](Connection::send).
pub struct WebSocketConnection {
    id: ConnectionId,
    path: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(send_failed)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let msg = self.stream.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(WsError::ConnectionClosed)) => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn ping(&self) -> Result<(), TransportError> {
        let msg = Message::Ping(Vec::new().into());
        self.sink.lock().await.send(msg).await.map_err(send_failed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await.map_err(send_failed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn path(&self) -> &str {
        &self.path
    }
}

fn send_failed(e: WsError) -> TransportError {
    TransportError::SendFailed(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        e,
    ))
}
