//! Hybrid Logical Clock timestamps.
//!
//! Combines physical time with a logical counter so that a timestamp produced
//! by [`HybridTimestamp::tick`] is always strictly greater than the one it was
//! derived from, even when the wall clock has not moved (or moved backwards).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Hybrid Logical Clock timestamp.
///
/// Consists of:
/// - `wall_time`: Milliseconds since Unix epoch (physical component)
/// - `logical`: Logical counter for events at the same wall time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HybridTimestamp {
    /// Physical time component (milliseconds since Unix epoch).
    wall_time: u64,
    /// Logical counter for ordering events at the same wall time.
    logical: u32,
}

/// Current wall time in milliseconds. A clock set before the epoch reads as 0.
fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl HybridTimestamp {
    /// Creates a new timestamp at the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            wall_time: wall_clock_millis(),
            logical: 0,
        }
    }

    /// Creates a timestamp from components.
    #[must_use]
    pub const fn new(wall_time: u64, logical: u32) -> Self {
        Self { wall_time, logical }
    }

    /// Returns the wall time component.
    #[must_use]
    pub const fn wall_time(&self) -> u64 {
        self.wall_time
    }

    /// Returns the logical counter.
    #[must_use]
    pub const fn logical(&self) -> u32 {
        self.logical
    }

    /// Generates the next timestamp, ensuring monotonicity.
    ///
    /// The result is strictly greater than `self` unless the logical counter
    /// is already saturated at the same wall time.
    #[must_use]
    pub fn tick(&self) -> Self {
        let now = wall_clock_millis();

        if now > self.wall_time {
            Self {
                wall_time: now,
                logical: 0,
            }
        } else {
            Self {
                wall_time: self.wall_time,
                logical: self.logical.saturating_add(1),
            }
        }
    }

    /// Returns a timestamp `millis` earlier on the wall clock, clamped at the
    /// epoch. Used to compute retention cutoffs.
    #[must_use]
    pub const fn saturating_sub_millis(&self, millis: u64) -> Self {
        Self {
            wall_time: self.wall_time.saturating_sub(millis),
            logical: self.logical,
        }
    }

    /// Returns true if this timestamp is before the other.
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Returns true if this timestamp is after the other.
    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }
}

impl Default for HybridTimestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for HybridTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.wall_time, self.logical)
    }
}

impl FromStr for HybridTimestamp {
    type Err = crate::Error;

    /// Parses the `{wall_time}.{logical}` form produced by `Display`.
    fn from_str(s: &str) -> crate::Result<Self> {
        let invalid = || crate::Error::InvalidTimestamp(s.to_string());
        let (wall, logical) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            wall_time: wall.parse().map_err(|_| invalid())?,
            logical: logical.parse().map_err(|_| invalid())?,
        })
    }
}

impl PartialOrd for HybridTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HybridTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.wall_time.cmp(&other.wall_time) {
            Ordering::Equal => self.logical.cmp(&other.logical),
            other => other,
        }
    }
}
