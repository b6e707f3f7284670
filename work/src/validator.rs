//! PoW validation.

use bftb_crypto::blake2b_256_multi;

use crate::{Difficulty, WorkCounter};

/// Digest of `payload || counter` with the counter in big-endian order.
pub fn work_digest(payload: &[u8], counter: WorkCounter) -> [u8; 32] {
    blake2b_256_multi(&[payload, &counter.0.to_be_bytes()])
}

/// Whether `counter` is valid work for `payload` at `difficulty`.
pub fn validate_work(payload: &[u8], counter: WorkCounter, difficulty: Difficulty) -> bool {
    difficulty.is_met_by(&work_digest(payload, counter))
}
