//! A single ledger replica.
//!
//! A replica never talks to other replicas. It authenticates and orders every
//! request through a fixed validation pipeline (signature, throttle, proof of
//! work, nonce, timestamp), applies it to its ledger under one exclusive lock,
//! persists the ledger, and answers with a response signed by its own key.

pub mod config;
pub mod error;
pub mod metrics;
pub mod nonce;
pub mod service;
pub mod shutdown;
pub mod throttle;
pub mod validator;

mod api;

pub use config::{ReplicaConfig, ThrottleConfig};
pub use error::ReplicaError;
pub use metrics::ReplicaMetrics;
pub use nonce::{NonceTable, DEFAULT_MAX_KEYS, MAX_OUTSTANDING_PER_KEY};
pub use service::Replica;
pub use shutdown::{ShutdownController, ShutdownReason};
pub use throttle::WriteThrottle;
pub use validator::{RequestValidator, Stage, ValidationError, WriteKind};
