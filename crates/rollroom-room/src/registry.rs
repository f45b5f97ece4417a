//! Registry: the directory of live rooms, keyed by name.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rollroom_dice::Roller;
use rollroom_protocol::RoomSnapshot;

use crate::error::echo_name;
use crate::{JoinOutcome, Outbox, Room, RoomConfig, RoomError, SessionId};

/// Creates rooms on first use and forgets them when they close.
///
/// The registry lock is only held for map lookups and inserts. It may take
/// a room's lock while held; a room never takes the registry lock while
/// holding its own.
pub struct Registry {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
    config: RoomConfig,
    roller: Arc<dyn Roller>,
    this: Weak<Registry>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: RoomConfig, roller: Arc<dyn Roller>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            rooms: Mutex::new(HashMap::new()),
            config,
            roller,
            this: this.clone(),
        })
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Returns the live room called `name`, creating it if there is none.
    ///
    /// A room that closed but has not yet been removed is replaced, so the
    /// caller always gets a room that can still be joined (barring a race
    /// with its closure, which [`join`](Self::join) retries).
    pub fn resolve_or_create(&self, name: &str) -> Result<Arc<Room>, RoomError> {
        if name.is_empty() || name.len() > Room::MAX_NAME_BYTES {
            return Err(RoomError::InvalidRoomName(echo_name(name)));
        }

        let mut rooms = self.rooms.lock();
        if let Some(room) = rooms.get(name) {
            if !room.is_closed() {
                return Ok(Arc::clone(room));
            }
        }

        let room = Arc::new(Room::with_registry(
            name.to_string(),
            self.config.default_roll,
            Arc::clone(&self.roller),
            self.this.clone(),
        ));
        rooms.insert(name.to_string(), Arc::clone(&room));
        tracing::info!(room = name, rooms = rooms.len(), "room created");
        Ok(room)
    }

    /// Resolves `name` and joins it, retrying if the room closed in between.
    pub fn join(
        &self,
        name: &str,
        session: SessionId,
        user: &str,
        roll_spec: &str,
        outbox: Outbox,
    ) -> Result<(Arc<Room>, JoinOutcome), RoomError> {
        loop {
            let room = self.resolve_or_create(name)?;
            match room.join(session, user, roll_spec, outbox.clone()) {
                Ok(outcome) => return Ok((room, outcome)),
                Err(RoomError::Closed(_)) => {
                    tracing::debug!(room = name, "raced with room closure, retrying");
                }
                Err(e) => {
                    room.close_if_empty();
                    return Err(e);
                }
            }
        }
    }

    /// Removes the entry for `name`. Removing a missing name is a no-op.
    pub fn remove(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.lock().remove(name)
    }

    /// Removes `room`'s entry if it still points at `room`.
    pub(crate) fn release(&self, room: &Room) {
        let mut rooms = self.rooms.lock();
        let current = rooms
            .get(room.name())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), room));
        if current {
            rooms.remove(room.name());
            tracing::debug!(room = room.name(), rooms = rooms.len(), "room removed");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.lock().get(name).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Names of all registered rooms, sorted.
    pub fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Point-in-time copies of every room's state, sorted by name.
    pub fn snapshot_all(&self) -> Vec<RoomSnapshot> {
        let rooms: Vec<Arc<Room>> = self.rooms.lock().values().cloned().collect();
        let mut snapshots: Vec<RoomSnapshot> =
            rooms.iter().map(|room| room.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("rooms", &self.room_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
