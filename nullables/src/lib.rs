//! Nullable infrastructure for deterministic testing.
//!
//! A [`NullReplica`] wraps a real in-process replica behind the same
//! [`bftb_protocol::ReplicaApi`] seam the HTTP client implements, and can be
//! switched at runtime into the failure modes a quorum must survive:
//! unreachable, forged signatures, lying reads, dropped writes, slow answers.
//!
//! Usage: build a [`LocalCluster`], hand `cluster.apis()` to a client session,
//! and flip behaviours between operations.

pub mod cluster;
pub mod replica;

pub use cluster::{replica_identity, LocalCluster, TEST_DIFFICULTY_BITS};
pub use replica::{Behavior, NullReplica, CORRUPT_BALANCE_OFFSET};
