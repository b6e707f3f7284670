//! Anti-spam proof-of-work.
//!
//! Not mining: a small computational cost attached to every write request so that
//! flooding a replica is expensive. A counter is valid for a payload when
//! `blake2b_256(payload || counter_be)` starts with the required number of zero bits.
//! The default of 16 bits means the first two digest bytes are zero (~65k attempts).

pub mod difficulty;
pub mod error;
pub mod generator;
pub mod validator;

pub use difficulty::Difficulty;
pub use error::WorkError;
pub use generator::WorkGenerator;
pub use validator::{validate_work, work_digest};

/// The counter a client attaches to a write request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkCounter(pub u64);
