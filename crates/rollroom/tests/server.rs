//! End-to-end tests: a real server, real WebSocket clients, binary frames.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rollroom::prelude::*;
use rollroom::protocol::{BinaryCodec, Codec, Envelope, Payload};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Rolls 10, 11, 12, ... in join order.
struct Counting(AtomicI64);

impl Roller for Counting {
    fn roll(&self, _dice: &DiceRoll) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Starts a server on a random port.
async fn start_server() -> (String, Arc<Registry>) {
    let server = Server::builder()
        .bind("127.0.0.1:0")
        .roller(Counting(AtomicI64::new(10)))
        .build()
        .await
        .expect("server should build");

    let addr = server.local_addr().to_string();
    let registry = server.registry();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, registry)
}

async fn connect(addr: &str, room: &str) -> ClientWs {
    let (ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/{room}"))
            .await
            .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, envelope: &Envelope) {
    let bytes = BinaryCodec.encode(envelope).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

/// Reads the next snapshot, skipping control frames.
async fn next_snapshot(ws: &mut ClientWs) -> RoomSnapshot {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("snapshot should arrive")
            .expect("stream open")
            .expect("frame ok");
        if !msg.is_binary() {
            continue;
        }
        match BinaryCodec.decode(&msg.into_data()).expect("decode").payload {
            Payload::Snapshot(snap) => return snap,
            other => panic!("unexpected payload {other:?}"),
        }
    }
}

/// True if the server ends the connection within two seconds.
async fn server_hangs_up(ws: &mut ClientWs) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) => return true,
            Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

async fn wait_for_room_count(registry: &Registry, expected: usize) {
    for _ in 0..100 {
        if registry.room_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} rooms, found {}",
        registry.room_count()
    );
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_full_room_lifecycle() {
    let (addr, registry) = start_server().await;
    let mut a = connect(&addr, "test1").await;
    let mut b = connect(&addr, "test1").await;

    send(&mut a, &Envelope::join("A", "1d20")).await;
    let snap = next_snapshot(&mut a).await;
    assert_eq!(snap.version, 1);
    assert_eq!(snap.name, "test1");
    assert_eq!(snap.results[0].id, 0);
    assert_eq!(snap.results[0].value, 10);

    send(&mut b, &Envelope::join("B", "")).await;
    let for_b = next_snapshot(&mut b).await;
    let for_a = next_snapshot(&mut a).await;
    assert_eq!(for_a, for_b);
    assert_eq!(for_a.version, 2);
    // B rolled 11, so B sorts first.
    assert_eq!(for_a.results[0].user, "B");
    assert_eq!(for_a.results[0].id, 1);

    send(&mut a, &Envelope::toggle_done("A")).await;
    let snap = next_snapshot(&mut b).await;
    assert_eq!(snap.version, 3);
    assert!(snap.result_for("A").unwrap().is_done);
    assert!(!snap.result_for("B").unwrap().is_done);

    a.close(None).await.unwrap();
    b.close(None).await.unwrap();
    wait_for_room_count(&registry, 0).await;

    // Same name, brand-new room.
    let mut c = connect(&addr, "test1").await;
    send(&mut c, &Envelope::join("C", "")).await;
    let snap = next_snapshot(&mut c).await;
    assert_eq!(snap.version, 1);
    assert_eq!(snap.results.len(), 1);
    assert_eq!(snap.results[0].id, 0);
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let (addr, registry) = start_server().await;
    let mut a = connect(&addr, "north").await;
    let mut b = connect(&addr, "south").await;

    send(&mut a, &Envelope::join("A", "")).await;
    send(&mut b, &Envelope::join("B", "")).await;
    assert_eq!(next_snapshot(&mut a).await.results.len(), 1);
    assert_eq!(next_snapshot(&mut b).await.results.len(), 1);
    assert_eq!(registry.room_names(), ["north", "south"]);
}

#[tokio::test]
async fn test_non_join_first_frame_disconnects() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(&addr, "test1").await;

    send(&mut ws, &Envelope::toggle_done("A")).await;
    assert!(server_hangs_up(&mut ws).await);
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_unknown_kind_disconnects() {
    let (addr, _registry) = start_server().await;
    let mut ws = connect(&addr, "test1").await;

    ws.send(Message::Binary(vec![77, 1, b'1'].into())).await.unwrap();
    assert!(server_hangs_up(&mut ws).await);
}

#[tokio::test]
async fn test_empty_room_name_is_rejected() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(&addr, "").await;

    send(&mut ws, &Envelope::join("A", "")).await;
    assert!(server_hangs_up(&mut ws).await);
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_invalid_roll_spec_is_rejected() {
    let (addr, registry) = start_server().await;
    let mut ws = connect(&addr, "test1").await;

    send(&mut ws, &Envelope::join("A", "banana")).await;
    assert!(server_hangs_up(&mut ws).await);
    assert_eq!(registry.room_count(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (addr, _registry) = start_server().await;
    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nhost: x\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    tokio::time::timeout(
        Duration::from_secs(2),
        stream.read_to_string(&mut response),
    )
    .await
    .expect("health should answer")
    .unwrap();
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.ends_with("ok"));
}

#[tokio::test]
async fn test_abrupt_disconnect_detaches() {
    let (addr, registry) = start_server().await;
    let mut a = connect(&addr, "r").await;
    let mut b = connect(&addr, "r").await;
    send(&mut a, &Envelope::join("A", "")).await;
    next_snapshot(&mut a).await;
    send(&mut b, &Envelope::join("B", "")).await;
    next_snapshot(&mut b).await;

    drop(a);
    let room = registry.get("r").unwrap();
    for _ in 0..100 {
        if room.session_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(room.session_count(), 1);
    assert!(room.snapshot().result_for("A").is_some());
}

#[tokio::test]
async fn test_run_until_stops_accepting() {
    let server = Server::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().to_string();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let mut ws = connect(&addr, "r").await;
    send(&mut ws, &Envelope::join("A", "")).await;
    assert_eq!(next_snapshot(&mut ws).await.version, 1);

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();

    // Sessions already running are unaffected.
    send(&mut ws, &Envelope::toggle_done("A")).await;
    assert_eq!(next_snapshot(&mut ws).await.version, 2);

    let mut refused = false;
    for _ in 0..100 {
        let attempt =
            tokio_tungstenite::connect_async(format!("ws://{addr}/r")).await;
        if attempt.is_err() {
            refused = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(refused, "listener should be gone after shutdown");
}
