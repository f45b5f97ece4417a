//! Dice notation for rollroom.
//!
//! A room's roll is written as `<count>d<sides>[+|-<modifier>]`, e.g.
//! `1d20`, `3d6+2` or `2d8-1`. [`DiceRoll`] parses that notation, prints it
//! back in canonical form, and rolls it.
//!
//! Rolling goes through the [`Roller`] trait so rooms can be driven by a
//! deterministic roller in tests while the server uses [`RandomRoller`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `<count>d<sides>` with an optional signed modifier, whole string only.
static DICE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)[dD](\d+)([+-]\d+)?$").expect("dice pattern is valid")
});

/// Errors produced while parsing dice notation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    /// The string does not match `<count>d<sides>[+|-<modifier>]`.
    #[error(
        "`{0}` is not dice notation (expected <count>d<sides>[+|-<modifier>])"
    )]
    Syntax(String),

    /// The notation is well-formed but a number is outside the
    /// supported range.
    #[error("`{spec}`: {reason}")]
    OutOfRange {
        /// The rejected input.
        spec: String,
        /// Which bound was violated.
        reason: &'static str,
    },
}

/// A parsed dice expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceRoll {
    /// Number of dice thrown.
    pub count: u32,
    /// Faces per die.
    pub sides: u32,
    /// Flat amount added to the sum.
    pub modifier: i64,
}

impl DiceRoll {
    /// Largest accepted dice count.
    pub const MAX_COUNT: u32 = 1_000;

    /// Largest accepted number of faces.
    pub const MAX_SIDES: u32 = 1_000_000;

    /// Creates a roll, checking the same bounds as parsing does.
    pub fn new(count: u32, sides: u32, modifier: i64) -> Result<Self, DiceError> {
        let roll = Self {
            count,
            sides,
            modifier,
        };
        roll.check_bounds(&roll.to_string())?;
        Ok(roll)
    }

    /// Parses dice notation. Surrounding whitespace is ignored.
    pub fn parse(spec: &str) -> Result<Self, DiceError> {
        let trimmed = spec.trim();
        let caps = DICE_PATTERN
            .captures(trimmed)
            .ok_or_else(|| DiceError::Syntax(spec.to_string()))?;

        let out_of_range = |reason| DiceError::OutOfRange {
            spec: spec.to_string(),
            reason,
        };
        let count = caps[1]
            .parse::<u32>()
            .map_err(|_| out_of_range("dice count is too large"))?;
        let sides = caps[2]
            .parse::<u32>()
            .map_err(|_| out_of_range("number of sides is too large"))?;
        let modifier = match caps.get(3) {
            Some(m) => m
                .as_str()
                .parse::<i64>()
                .map_err(|_| out_of_range("modifier is too large"))?,
            None => 0,
        };

        let roll = Self {
            count,
            sides,
            modifier,
        };
        roll.check_bounds(spec)?;
        Ok(roll)
    }

    fn check_bounds(&self, spec: &str) -> Result<(), DiceError> {
        let reason = if self.count == 0 {
            Some("at least one die is required")
        } else if self.count > Self::MAX_COUNT {
            Some("dice count is too large")
        } else if self.sides == 0 {
            Some("dice need at least one side")
        } else if self.sides > Self::MAX_SIDES {
            Some("number of sides is too large")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(DiceError::OutOfRange {
                spec: spec.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Smallest possible outcome.
    pub fn min(&self) -> i64 {
        i64::from(self.count).saturating_add(self.modifier)
    }

    /// Largest possible outcome.
    pub fn max(&self) -> i64 {
        (i64::from(self.count) * i64::from(self.sides))
            .saturating_add(self.modifier)
    }

    /// Throws every die once and adds the modifier.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> i64 {
        let sum: i64 = (0..self.count)
            .map(|_| i64::from(rng.random_range(1..=self.sides)))
            .sum();
        sum.saturating_add(self.modifier)
    }
}

impl Default for DiceRoll {
    /// A single twenty-sided die.
    fn default() -> Self {
        Self {
            count: 1,
            sides: 20,
            modifier: 0,
        }
    }
}

impl FromStr for DiceRoll {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DiceRoll {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DiceRoll> for String {
    fn from(roll: DiceRoll) -> Self {
        roll.to_string()
    }
}

/// Canonical notation: a zero modifier is omitted.
impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// Produces outcomes for dice expressions.
pub trait Roller: Send + Sync + 'static {
    /// Rolls `dice` once.
    fn roll(&self, dice: &DiceRoll) -> i64;
}

/// A [`Roller`] backed by the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomRoller;

impl Roller for RandomRoller {
    fn roll(&self, dice: &DiceRoll) -> i64 {
        dice.roll(&mut rand::rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let roll: DiceRoll = "1d20".parse().unwrap();
        assert_eq!(
            roll,
            DiceRoll {
                count: 1,
                sides: 20,
                modifier: 0
            }
        );
    }

    #[test]
    fn test_parse_with_modifiers() {
        assert_eq!(DiceRoll::parse("3d6+2").unwrap().modifier, 2);
        assert_eq!(DiceRoll::parse("2d8-1").unwrap().modifier, -1);
        assert_eq!(DiceRoll::parse("  4D4 ").unwrap().count, 4);
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(DiceRoll::parse("1d20+0").unwrap().to_string(), "1d20");
        assert_eq!(DiceRoll::parse("2d6+3").unwrap().to_string(), "2d6+3");
        assert_eq!(DiceRoll::parse("1d8-1").unwrap().to_string(), "1d8-1");
        assert_eq!(DiceRoll::default().to_string(), "1d20");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "d20", "1d", "twenty", "1d20+", "1d20 + 2", "x1d20"] {
            assert!(
                matches!(DiceRoll::parse(bad), Err(DiceError::Syntax(_))),
                "{bad:?} should be a syntax error"
            );
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        for bad in ["0d6", "1d0", "1001d6", "1d1000001", "99999999999d6"] {
            assert!(
                matches!(
                    DiceRoll::parse(bad),
                    Err(DiceError::OutOfRange { .. })
                ),
                "{bad:?} should be out of range"
            );
        }
    }

    #[test]
    fn test_new_checks_bounds() {
        assert!(DiceRoll::new(2, 6, 1).is_ok());
        assert!(DiceRoll::new(0, 6, 0).is_err());
    }

    #[test]
    fn test_roll_stays_within_bounds() {
        let dice = DiceRoll::parse("3d6-2").unwrap();
        assert_eq!(dice.min(), 1);
        assert_eq!(dice.max(), 16);

        let mut rng = rand::rng();
        for _ in 0..500 {
            let v = dice.roll(&mut rng);
            assert!((dice.min()..=dice.max()).contains(&v), "{v} out of range");
        }
    }

    #[test]
    fn test_one_sided_dice_are_deterministic() {
        let dice = DiceRoll::parse("5d1+10").unwrap();
        assert_eq!(RandomRoller.roll(&dice), 15);
    }

    #[test]
    fn test_string_conversions_used_by_serde() {
        let dice = DiceRoll::parse("2d6+3").unwrap();
        let text = String::from(dice);
        assert_eq!(text, "2d6+3");
        assert_eq!(DiceRoll::try_from(text).unwrap(), dice);
        assert!(DiceRoll::try_from("nope".to_string()).is_err());
    }
}
