//! Difficulty expressed as required leading zero bits of the work digest.

use serde::{Deserialize, Serialize};

use crate::WorkError;

/// Number of leading zero bits a work digest must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(u32);

impl Difficulty {
    /// Two zero bytes.
    pub const DEFAULT: Self = Self(16);

    /// Accepts everything. Only useful in tests.
    pub const NONE: Self = Self(0);

    /// Beyond this a 64-bit counter space is no longer a realistic search space.
    pub const MAX_BITS: u32 = 48;

    pub fn new(bits: u32) -> Result<Self, WorkError> {
        if bits > Self::MAX_BITS {
            return Err(WorkError::DifficultyTooHigh {
                bits,
                max: Self::MAX_BITS,
            });
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether `digest` has at least the required number of leading zero bits.
    pub fn is_met_by(&self, digest: &[u8; 32]) -> bool {
        leading_zero_bits(digest) >= self.0
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Count leading zero bits across the whole digest.
pub fn leading_zero_bits(digest: &[u8; 32]) -> u32 {
    let mut bits = 0;
    for byte in digest {
        if *byte == 0 {
            bits += 8;
        } else {
            bits += byte.leading_zeros();
            break;
        }
    }
    bits
}
