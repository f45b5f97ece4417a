//! Per-session snapshot queue: capacity one, newest wins.
//!
//! The room offers snapshots without ever waiting. A session that falls
//! behind simply finds the latest snapshot waiting when it next looks;
//! intermediate versions are skipped, never queued.

use std::sync::Arc;

use rollroom_protocol::RoomSnapshot;
use tokio::sync::watch;

type Slot = Option<Arc<RoomSnapshot>>;

/// Creates a connected queue pair.
pub fn outbox() -> (Outbox, Inbox) {
    let (tx, rx) = watch::channel(None);
    (Outbox { tx: Arc::new(tx) }, Inbox { rx })
}

/// The room's end of a session queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: Arc<watch::Sender<Slot>>,
}

impl Outbox {
    /// Stores `snapshot` unless the queue already holds the same or a
    /// newer version. Never blocks.
    ///
    /// Returns whether the snapshot was stored.
    pub fn offer(&self, snapshot: Arc<RoomSnapshot>) -> bool {
        self.tx.send_if_modified(|slot| {
            let newer = slot
                .as_ref()
                .is_none_or(|held| held.version < snapshot.version);
            if newer {
                *slot = Some(snapshot);
            }
            newer
        })
    }

    /// Version of the newest snapshot offered so far, 0 if none.
    pub fn version(&self) -> u64 {
        self.tx.borrow().as_ref().map_or(0, |s| s.version)
    }
}

/// The session's end of the queue.
#[derive(Debug)]
pub struct Inbox {
    rx: watch::Receiver<Slot>,
}

impl Inbox {
    /// Waits for a snapshot newer than the last one returned.
    ///
    /// Returns `None` once every [`Outbox`] for this queue is dropped.
    /// Cancel safe, so it can sit in a `select!`.
    pub async fn recv(&mut self) -> Option<Arc<RoomSnapshot>> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(snapshot) = self.rx.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }
}
