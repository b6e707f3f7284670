//! Fundamental types for the bftb replicated ledger.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! keys and signatures, account and transaction identifiers, write timestamps,
//! quorum parameters, and the error taxonomy replicas report over the wire.

pub mod error;
pub mod ids;
pub mod keys;
pub mod quorum;
pub mod time;
pub mod transaction;

pub use error::BankError;
pub use ids::{AccountId, Nonce, TransactionId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use quorum::{QuorumParams, QuorumParamsError};
pub use time::WriteTimestamp;
pub use transaction::{Balance, Transaction};
