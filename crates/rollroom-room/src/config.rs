//! Room configuration.

use rollroom_dice::DiceRoll;
use serde::{Deserialize, Serialize};

/// Settings applied to every room the registry creates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Roll used when the first joiner does not name one.
    pub default_roll: DiceRoll,
}
