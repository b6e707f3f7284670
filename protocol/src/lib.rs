//! Replica RPC surface.
//!
//! [`ReplicaApi`] is the seam between the client's quorum logic and however a
//! replica is reached: in process, over HTTP, or through a fault-injecting test
//! double. Nothing above this trait knows which.

pub mod api;
pub mod error;
pub mod key_exchange;
pub mod paths;
pub mod version;

pub use api::ReplicaApi;
pub use error::CallError;
pub use key_exchange::{
    collect_replica_keys, KeyExchangeError, ReplicaDirectory, MAX_RETRY_BACKOFF,
};
pub use version::PROTOCOL_VERSION;
