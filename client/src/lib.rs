//! Client side of the replicated bank.
//!
//! A [`ClientSession`] talks to every replica at once and only trusts a value
//! once more than `T = floor((N + f) / 2)` replicas have returned it with a
//! valid signature. Reads that reveal lagging replicas push the certified
//! state back to them before returning.

pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod keystore;
pub mod quorum;
pub mod session;
mod write_back;

pub use config::ClientConfig;
pub use error::{ClientError, ReplicaFailure};
pub use http::HttpReplica;
pub use keystore::{decrypt_keystore, encrypt_keystore, load_keystore, save_keystore, KeystoreFile};
pub use quorum::{Certified, Tally};
pub use session::{AccountStatement, ClientSession, SessionOptions};
