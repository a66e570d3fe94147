//! Betting doors and dice results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of dice rolled per round.
pub const DICE_PER_ROUND: usize = 3;

/// One of the six betting targets.
///
/// `ALL` gives the display order only; no logic depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Door {
    Nai,
    Bau,
    Ga,
    Ca,
    Cua,
    Tom,
}

impl Door {
    pub const ALL: [Door; 6] = [
        Door::Nai,
        Door::Bau,
        Door::Ga,
        Door::Ca,
        Door::Cua,
        Door::Tom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nai => "nai",
            Self::Bau => "bau",
            Self::Ga => "ga",
            Self::Ca => "ca",
            Self::Cua => "cua",
            Self::Tom => "tom",
        }
    }
}

impl fmt::Display for Door {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Door {
    type Err = UnknownDoor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Door::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDoor(s.to_string()))
    }
}

/// Returned when a door name is not one of the six.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDoor(pub String);

impl fmt::Display for UnknownDoor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown door '{}'", self.0)
    }
}

impl std::error::Error for UnknownDoor {}

/// Faces shown by the three dice at the end of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceResult(pub [Door; DICE_PER_ROUND]);

impl DiceResult {
    /// How many dice show `door`.
    pub fn hits(&self, door: Door) -> usize {
        self.0.iter().filter(|d| **d == door).count()
    }

    pub fn doors(&self) -> &[Door] {
        &self.0
    }
}
