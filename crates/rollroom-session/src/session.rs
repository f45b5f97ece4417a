//! The per-connection session actor.
//!
//! A session runs from the moment a connection is routed to a room until
//! that connection ends:
//!
//!   1. Read the first frame; it must be a JoinRequest (handshake).
//!   2. Join the room through the registry.
//!   3. Run two tasks: inbound (read frames, apply toggles) and outbound
//!      (write snapshots, ping). Either one ending cancels the other.
//!   4. Detach from the room, then close the connection.
//!
//! Nothing is ever written back for a bad frame; the connection is closed.

use std::sync::Arc;

use rollroom_protocol::{Codec, Envelope, JoinRequest, Payload};
use rollroom_room::{outbox, Inbox, Registry, Room, SessionId};
use rollroom_transport::Connection;
use tokio::time::MissedTickBehavior;

use crate::{Cancellation, SessionConfig, SessionError};

/// Everything a session needs besides its connection.
pub struct SessionContext<K: Codec> {
    pub registry: Arc<Registry>,
    pub codec: Arc<K>,
    pub config: SessionConfig,
}

impl<K: Codec> Clone for SessionContext<K> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            codec: Arc::clone(&self.codec),
            config: self.config.clone(),
        }
    }
}

/// Detaches the session from its room and stops both loops, including
/// when the session future is dropped or a loop panics.
struct DetachGuard {
    room: Arc<Room>,
    session: SessionId,
    cancel: Cancellation,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.room.detach(self.session);
    }
}

/// Runs one connection's session in the room called `room_name`.
///
/// Returns `Ok` when the peer went away normally and an error describing
/// why the session ended otherwise. The connection is closed either way.
pub async fn run_session<C, K>(
    conn: C,
    room_name: &str,
    ctx: SessionContext<K>,
) -> Result<(), SessionError>
where
    C: Connection,
    K: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let join = match handshake(&*conn, &*ctx.codec, &ctx.config).await {
        Ok(join) => join,
        Err(e) => {
            tracing::debug!(
                %conn_id,
                room = room_name,
                error = %e,
                "handshake failed"
            );
            let _ = conn.close().await;
            return Err(e);
        }
    };

    let session = SessionId::next();
    let (tx, inbox) = outbox();
    let joined = ctx
        .registry
        .join(room_name, session, &join.user, &join.roll, tx);
    let (room, outcome) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            tracing::debug!(
                %conn_id,
                room = room_name,
                user = %join.user,
                error = %e,
                "join rejected"
            );
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    tracing::debug!(
        %conn_id,
        %session,
        room = room.name(),
        id = outcome.id,
        "session started"
    );

    let cancel = Cancellation::new();
    let guard = DetachGuard {
        room: Arc::clone(&room),
        session,
        cancel: cancel.clone(),
    };

    let inbound = tokio::spawn(inbound_loop(
        Arc::clone(&conn),
        Arc::clone(&room),
        Arc::clone(&ctx.codec),
        cancel.clone(),
    ));
    let outbound = tokio::spawn(outbound_loop(
        Arc::clone(&conn),
        inbox,
        Arc::clone(&ctx.codec),
        ctx.config.clone(),
        cancel.clone(),
    ));

    let (inbound, outbound) = tokio::join!(inbound, outbound);
    drop(guard);
    let _ = conn.close().await;

    let result = flatten(inbound).and(flatten(outbound));
    match &result {
        Ok(()) => tracing::info!(
            %session,
            room = room.name(),
            user = %join.user,
            "session ended"
        ),
        Err(e) => tracing::info!(
            %session,
            room = room.name(),
            user = %join.user,
            error = %e,
            "session ended with error"
        ),
    }
    result
}

fn flatten(
    joined: Result<Result<(), SessionError>, tokio::task::JoinError>,
) -> Result<(), SessionError> {
    match joined {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "session task panicked");
            Ok(())
        }
    }
}

/// Reads and validates the first frame.
async fn handshake<C, K>(
    conn: &C,
    codec: &K,
    config: &SessionConfig,
) -> Result<JoinRequest, SessionError>
where
    C: Connection,
    K: Codec,
{
    let frame = tokio::time::timeout(config.handshake_timeout, conn.recv())
        .await
        .map_err(|_| SessionError::HandshakeTimeout)??
        .ok_or(SessionError::ClosedBeforeJoin)?;

    let envelope = codec.decode(&frame)?;
    match envelope.payload {
        Payload::Join(join) => Ok(join),
        other => Err(SessionError::ProtocolViolation(format!(
            "expected JoinRequest, got {}",
            other.kind()
        ))),
    }
}

/// Reads frames until the peer leaves, misbehaves, or the session is
/// cancelled. Cancels the session on the way out.
async fn inbound_loop<C, K>(
    conn: Arc<C>,
    room: Arc<Room>,
    codec: Arc<K>,
    cancel: Cancellation,
) -> Result<(), SessionError>
where
    C: Connection,
    K: Codec,
{
    let result = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            frame = conn.recv() => frame,
        };

        let bytes = match frame {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(conn_id = %conn.id(), "peer closed");
                break Ok(());
            }
            Err(e) => break Err(SessionError::Connection(e)),
        };

        let envelope = match codec.decode(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    conn_id = %conn.id(),
                    error = %e,
                    "undecodable frame"
                );
                break Err(SessionError::Protocol(e));
            }
        };

        match envelope.payload {
            Payload::ToggleDone(req) => {
                if let Err(e) = room.toggle_done(&req.user) {
                    tracing::debug!(
                        room = room.name(),
                        user = %req.user,
                        error = %e,
                        "toggle rejected"
                    );
                }
            }
            other => {
                let kind = other.kind();
                tracing::warn!(
                    conn_id = %conn.id(),
                    %kind,
                    "unexpected frame after join"
                );
                break Err(SessionError::ProtocolViolation(format!(
                    "{kind} is not allowed after join"
                )));
            }
        }
    };

    cancel.cancel();
    result
}

/// Writes snapshots and keepalive pings until cancelled or a write fails.
/// This is the only writer on the connection.
async fn outbound_loop<C, K>(
    conn: Arc<C>,
    mut inbox: Inbox,
    codec: Arc<K>,
    config: SessionConfig,
    cancel: Cancellation,
) -> Result<(), SessionError>
where
    C: Connection,
    K: Codec,
{
    let mut keepalive = tokio::time::interval(config.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    keepalive.tick().await;

    let mut last_written = 0u64;
    let result = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            snapshot = inbox.recv() => {
                let Some(snapshot) = snapshot else { break Ok(()) };
                if snapshot.version <= last_written {
                    continue;
                }
                let frame = match codec.encode(&Envelope::snapshot((*snapshot).clone())) {
                    Ok(frame) => frame,
                    Err(e) => break Err(SessionError::Protocol(e)),
                };
                if let Err(e) = conn.send(&frame).await {
                    break Err(SessionError::Connection(e));
                }
                last_written = snapshot.version;
                tracing::debug!(
                    conn_id = %conn.id(),
                    version = last_written,
                    "snapshot written"
                );
            }
            _ = keepalive.tick() => {
                if let Err(e) = conn.ping().await {
                    break Err(SessionError::Connection(e));
                }
            }
        }
    };

    if let Err(e) = &result {
        tracing::debug!(conn_id = %conn.id(), error = %e, "outbound stopped");
    }
    cancel.cancel();
    result
}
