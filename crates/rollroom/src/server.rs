//! `Server` builder and accept loop.
//!
//! Ties the layers together: transport → session → room. The room a
//! connection joins is named by the first segment of its request path.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use rollroom_dice::{RandomRoller, Roller};
use rollroom_protocol::BinaryCodec;
use rollroom_room::{Registry, RoomConfig};
use rollroom_session::{run_session, SessionConfig, SessionContext};
use rollroom_transport::{
    Connection, Transport, TransportError, WebSocketTransport,
};

use crate::RollroomError;

/// Builder for configuring and starting a server.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use rollroom::prelude::*;
///
/// # async fn start() -> Result<(), RollroomError> {
/// let server = Server::builder()
///     .bind("127.0.0.1:9000")
///     .room_config(RoomConfig { default_roll: "2d6".parse()? })
///     .session_config(SessionConfig {
///         keepalive_interval: Duration::from_secs(10),
///         ..SessionConfig::default()
///     })
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    session_config: SessionConfig,
    roller: Arc<dyn Roller>,
}

impl ServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            session_config: SessionConfig::default(),
            roller: Arc::new(RandomRoller),
        }
    }

    /// Sets the address to listen on. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Replaces the dice roller, e.g. with a deterministic one.
    pub fn roller(mut self, roller: impl Roller) -> Self {
        self.roller = Arc::new(roller);
        self
    }

    /// Binds the listener. The server does not accept until
    /// [`Server::run`] is called.
    ///
    /// The session handshake timeout also bounds the WebSocket upgrade.
    pub async fn build(self) -> Result<Server, RollroomError> {
        let transport = WebSocketTransport::bind_with_timeout(
            &self.bind_addr,
            self.session_config.handshake_timeout,
        )
        .await?;
        let ctx = SessionContext {
            registry: Registry::new(self.room_config, self.roller),
            codec: Arc::new(BinaryCodec),
            config: self.session_config,
        };
        Ok(Server { transport, ctx })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound rollroom server.
pub struct Server {
    transport: WebSocketTransport,
    ctx: SessionContext<BinaryCodec>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// The live room directory, for inspection.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.ctx.registry)
    }

    /// Accepts connections and runs a session for each until the
    /// transport shuts down.
    pub async fn run(self) -> Result<(), RollroomError> {
        self.run_until(std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops accepting once `signal`
    /// resolves. Sessions already running are left to finish on their own.
    pub async fn run_until(
        mut self,
        signal: impl Future<Output = ()>,
    ) -> Result<(), RollroomError> {
        tracing::info!(addr = %self.local_addr(), "rollroom server running");
        tokio::pin!(signal);

        loop {
            let accepted = tokio::select! {
                () = &mut signal => {
                    self.transport.shutdown().await?;
                    tracing::info!(
                        rooms = self.ctx.registry.room_count(),
                        "shutdown requested, server stopping"
                    );
                    return Ok(());
                }
                accepted = self.transport.accept() => accepted,
            };
            let conn = match accepted {
                Ok(conn) => conn,
                Err(TransportError::Shutdown) => {
                    tracing::info!("transport shut down, server stopping");
                    return Ok(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    continue;
                }
            };

            let room = room_from_path(conn.path()).to_string();
            let ctx = self.ctx.clone();
            tokio::spawn(async move {
                let conn_id = conn.id();
                if let Err(e) = run_session(conn, &room, ctx).await {
                    tracing::debug!(
                        %conn_id,
                        room = %room,
                        error = %e,
                        "connection ended with error"
                    );
                }
            });
        }
    }
}

/// Extracts the room name: the first segment of the request path.
///
/// An empty result is passed on as is and rejected when the session tries
/// to join.
pub fn room_from_path(path: &str) -> &str {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
}
