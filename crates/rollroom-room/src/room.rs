//! A room: the authoritative state one group of users shares.
//!
//! All state sits behind one `parking_lot` mutex. Every operation takes the
//! lock, mutates, builds the resulting snapshot, and releases the lock
//! before anything is sent. Nothing in here awaits.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rollroom_dice::{DiceRoll, Roller};
use rollroom_protocol::{RollResult, RoomSnapshot, MAX_FRAME_BYTES};

use crate::error::echo_name;
use crate::{Outbox, Registry, RoomError};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Upper bounds on the varint bincode encoding of one result beyond its
/// user name, and of a snapshot envelope beyond its results and name.
const RESULT_OVERHEAD_BYTES: usize = 32;
const SNAPSHOT_OVERHEAD_BYTES: usize = 128;

// Every snapshot a room can produce must fit in one frame.
const _: () = assert!(
    Room::MAX_RESULTS * (Room::MAX_USER_NAME_BYTES + RESULT_OVERHEAD_BYTES)
        + Room::MAX_NAME_BYTES
        + SNAPSHOT_OVERHEAD_BYTES
        <= MAX_FRAME_BYTES as usize
);

/// Identifies one attached session within any room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Returns a process-unique id.
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What a successful join produced.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The id assigned to this join.
    pub id: u64,
    /// The value rolled for the user.
    pub value: i64,
    /// The room state right after the join.
    pub snapshot: Arc<RoomSnapshot>,
}

struct Attached {
    user: String,
    outbox: Outbox,
}

struct RoomState {
    roll: DiceRoll,
    version: u64,
    next_id: u64,
    results: HashMap<String, RollResult>,
    roster: HashMap<SessionId, Attached>,
    closed: bool,
}

impl RoomState {
    fn is_fresh(&self) -> bool {
        self.version == 0 && self.results.is_empty()
    }

    fn project(&self, name: &str) -> RoomSnapshot {
        RoomSnapshot::new(
            self.version,
            name,
            self.roll.to_string(),
            self.results.values().cloned().collect(),
        )
    }
}

/// A named room.
///
/// Rooms are created by the [`Registry`] and shared as `Arc<Room>` by every
/// session attached to them.
pub struct Room {
    name: String,
    roller: Arc<dyn Roller>,
    registry: Weak<Registry>,
    state: Mutex<RoomState>,
}

impl Room {
    /// Longest room name, in bytes.
    pub const MAX_NAME_BYTES: usize = 128;

    /// Longest user name, in bytes.
    pub const MAX_USER_NAME_BYTES: usize = 128;

    /// Most results a room keeps, counting users who have left.
    pub const MAX_RESULTS: usize = 1024;

    /// Creates a room outside any registry.
    ///
    /// Closing such a room removes nothing; see [`Registry`] for the
    /// managed lifecycle.
    pub fn new(
        name: impl Into<String>,
        roll: DiceRoll,
        roller: Arc<dyn Roller>,
    ) -> Self {
        Self::with_registry(name.into(), roll, roller, Weak::new())
    }

    pub(crate) fn with_registry(
        name: String,
        roll: DiceRoll,
        roller: Arc<dyn Roller>,
        registry: Weak<Registry>,
    ) -> Self {
        Self {
            name,
            roller,
            registry,
            state: Mutex::new(RoomState {
                roll,
                version: 0,
                next_id: 0,
                results: HashMap::new(),
                roster: HashMap::new(),
                closed: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dice this room rolls.
    pub fn roll(&self) -> DiceRoll {
        self.state.lock().roll
    }

    pub fn version(&self) -> u64 {
        self.state.lock().version
    }

    /// Number of attached sessions.
    pub fn session_count(&self) -> usize {
        self.state.lock().roster.len()
    }

    /// True once the last session has detached.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Adds `user` to the room and attaches `session`.
    ///
    /// `roll_spec` only matters for a fresh room; an empty string keeps the
    /// room's default. A user rejoining under a name whose previous session
    /// is gone gets a new id and a new roll.
    ///
    /// # Errors
    /// - [`RoomError::Closed`] if the room lost its last session.
    /// - [`RoomError::InvalidUserName`] for an empty or overlong name.
    /// - [`RoomError::NameTaken`] if an attached session uses `user`.
    /// - [`RoomError::Full`] if `user` would be a new result past
    ///   [`MAX_RESULTS`](Self::MAX_RESULTS).
    /// - [`RoomError::UnknownRollSpec`] if `roll_spec` does not parse.
    ///
    /// Nothing is mutated when an error is returned.
    pub fn join(
        &self,
        session: SessionId,
        user: &str,
        roll_spec: &str,
        outbox: Outbox,
    ) -> Result<JoinOutcome, RoomError> {
        let (outcome, targets) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(RoomError::Closed(self.name.clone()));
            }
            if user.is_empty() || user.len() > Self::MAX_USER_NAME_BYTES {
                return Err(RoomError::InvalidUserName(echo_name(user)));
            }
            if state.roster.values().any(|a| a.user == user) {
                return Err(RoomError::NameTaken(user.to_string()));
            }
            if state.results.len() >= Self::MAX_RESULTS
                && !state.results.contains_key(user)
            {
                return Err(RoomError::Full(self.name.clone()));
            }
            if state.is_fresh() && !roll_spec.trim().is_empty() {
                state.roll = DiceRoll::parse(roll_spec)?;
            }

            let id = state.next_id;
            state.next_id += 1;
            let value = self.roller.roll(&state.roll);
            state.results.insert(
                user.to_string(),
                RollResult {
                    user: user.to_string(),
                    id,
                    value,
                    is_done: false,
                },
            );
            state.roster.insert(
                session,
                Attached {
                    user: user.to_string(),
                    outbox,
                },
            );
            state.version += 1;

            let snapshot = Arc::new(state.project(&self.name));
            let targets = outboxes(&state);
            (
                JoinOutcome {
                    id,
                    value,
                    snapshot,
                },
                targets,
            )
        };

        tracing::info!(
            room = %self.name,
            user,
            %session,
            id = outcome.id,
            value = outcome.value,
            version = outcome.snapshot.version,
            "user joined"
        );
        fan_out(&targets, &outcome.snapshot);
        Ok(outcome)
    }

    /// Flips `user`'s done flag and broadcasts the result.
    ///
    /// # Errors
    /// [`RoomError::UnknownUser`] if no result is recorded for `user`, or
    /// [`RoomError::Closed`] if the room is closed.
    pub fn toggle_done(
        &self,
        user: &str,
    ) -> Result<Arc<RoomSnapshot>, RoomError> {
        let (snapshot, targets) = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(RoomError::Closed(self.name.clone()));
            }
            let result = state
                .results
                .get_mut(user)
                .ok_or_else(|| RoomError::UnknownUser(user.to_string()))?;
            result.is_done = !result.is_done;
            state.version += 1;
            (Arc::new(state.project(&self.name)), outboxes(&state))
        };

        tracing::debug!(
            room = %self.name,
            user,
            version = snapshot.version,
            "done flag toggled"
        );
        fan_out(&targets, &snapshot);
        Ok(snapshot)
    }

    /// Detaches `session`. The user's result stays in the room.
    ///
    /// When the last session leaves, the room closes and drops out of its
    /// registry. Detaching an unknown session does nothing.
    ///
    /// Returns whether this call closed the room.
    pub fn detach(&self, session: SessionId) -> bool {
        let closed_now = {
            let mut state = self.state.lock();
            let Some(attached) = state.roster.remove(&session) else {
                return false;
            };
            tracing::info!(
                room = %self.name,
                user = %attached.user,
                %session,
                remaining = state.roster.len(),
                "session detached"
            );
            close_if_empty(&mut state)
        };

        if closed_now {
            self.closed();
        }
        closed_now
    }

    /// Closes the room if no session is attached.
    ///
    /// Used to discard a room whose only join attempt was rejected. A
    /// concurrent joiner then sees [`RoomError::Closed`] and moves on to a
    /// fresh room.
    pub fn close_if_empty(&self) -> bool {
        let closed_now = close_if_empty(&mut self.state.lock());
        if closed_now {
            self.closed();
        }
        closed_now
    }

    fn closed(&self) {
        tracing::info!(room = %self.name, "room closed");
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self);
        }
    }

    /// Offers `snapshot` to every attached session.
    ///
    /// The roster is copied under the lock and the offers happen after it
    /// is released. Sessions already holding a newer snapshot ignore it.
    pub fn broadcast(&self, snapshot: &Arc<RoomSnapshot>) {
        let targets = outboxes(&self.state.lock());
        fan_out(&targets, snapshot);
    }

    /// The current state as a snapshot.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.state.lock().project(&self.name)
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

fn close_if_empty(state: &mut RoomState) -> bool {
    if state.roster.is_empty() && !state.closed {
        state.closed = true;
        true
    } else {
        false
    }
}

fn outboxes(state: &RoomState) -> Vec<Outbox> {
    state.roster.values().map(|a| a.outbox.clone()).collect()
}

fn fan_out(targets: &[Outbox], snapshot: &Arc<RoomSnapshot>) {
    for outbox in targets {
        outbox.offer(Arc::clone(snapshot));
    }
}
