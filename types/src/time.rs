//! Logical write timestamps.
//!
//! These are not wall-clock values. Each replica keeps one ledger-wide counter
//! that every accepted write raises; clients pick `max(seen) + 1` for new writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A replica ledger timestamp, or the timestamp a client attaches to a write.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WriteTimestamp(u64);

impl WriteTimestamp {
    /// The timestamp of a freshly created ledger.
    pub const ZERO: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The smallest timestamp strictly greater than this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for WriteTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}
