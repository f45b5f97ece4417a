//! Client-side reconciliation of pushed snapshots.

use crate::types::{RollResult, RoomSnapshot};

/// The latest room state a client has seen.
///
/// Snapshots may arrive out of order; [`apply`](Self::apply) keeps only
/// versions newer than the one already held, so the view never moves
/// backwards.
#[derive(Debug, Clone, Default)]
pub struct RoomView {
    current: Option<RoomSnapshot>,
}

impl RoomView {
    /// An empty view at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the held snapshot, 0 before the first one arrives.
    pub fn version(&self) -> u64 {
        self.current.as_ref().map_or(0, |s| s.version)
    }

    /// Replaces the held snapshot if `snapshot` is strictly newer.
    ///
    /// Returns whether the view changed.
    pub fn apply(&mut self, snapshot: RoomSnapshot) -> bool {
        if snapshot.version <= self.version() {
            return false;
        }
        self.current = Some(snapshot);
        true
    }

    pub fn snapshot(&self) -> Option<&RoomSnapshot> {
        self.current.as_ref()
    }

    /// Results in display order, empty before the first snapshot.
    pub fn results(&self) -> &[RollResult] {
        self.current
            .as_ref()
            .map(|s| s.results.as_slice())
            .unwrap_or_default()
    }

    /// True when at least one user is present and every one is done.
    pub fn all_done(&self) -> bool {
        let results = self.results();
        !results.is_empty() && results.iter().all(|r| r.is_done)
    }
}
