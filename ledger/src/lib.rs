//! Replica-side ledger.
//!
//! Each replica owns one `Ledger`: the account set, every transaction ever
//! created (owned by the ledger and referenced from accounts by id), one global
//! write timestamp, and monotonically increasing id counters. The ledger knows
//! nothing about signatures, nonces or quorums; the replica validates requests
//! before calling in here.

pub mod account;
pub mod error;
pub mod ledger;
pub mod repair;
pub mod snapshot;

pub use account::Account;
pub use error::{LedgerError, SnapshotError};
pub use ledger::{Ledger, DEFAULT_ENDOWMENT};
pub use snapshot::{LedgerSnapshot, SnapshotStore};
