//! Startup key exchange.
//!
//! Fetches every replica's server key concurrently and waits until all of them
//! are known or a deadline passes; on timeout the error names the missing ones.
//!
//! Replicas only answer requests and never announce themselves, so a replica
//! that is not up yet has to be asked again. Each replica is polled on its own
//! exponential backoff, capped at [`MAX_RETRY_BACKOFF`], and the barrier
//! resolves as soon as the last key arrives.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tracing::{debug, info};

use bftb_types::PublicKey;

use crate::ReplicaApi;

/// Longest pause between two key requests to the same replica.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Keys of all replicas, indexed by replica id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaDirectory {
    keys: Vec<PublicKey>,
}

impl ReplicaDirectory {
    pub fn key(&self, replica: usize) -> Option<&PublicKey> {
        self.keys.get(replica)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.keys
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyExchangeError {
    #[error("no key from replicas {missing:?} after {waited:?}")]
    Incomplete {
        missing: Vec<usize>,
        /// Keys that did arrive, by replica id.
        partial: Vec<Option<PublicKey>>,
        waited: Duration,
    },
}

/// Block until every replica's key is known or `deadline` elapses.
///
/// A replica that fails is asked again after `first_retry`, then after twice
/// the previous pause, up to [`MAX_RETRY_BACKOFF`].
pub async fn collect_replica_keys(
    replicas: &[Arc<dyn ReplicaApi>],
    deadline: Duration,
    first_retry: Duration,
) -> Result<ReplicaDirectory, KeyExchangeError> {
    let mut keys: Vec<Option<PublicKey>> = vec![None; replicas.len()];

    let mut fetches: FuturesUnordered<_> = replicas
        .iter()
        .enumerate()
        .map(|(id, replica)| async move {
            let mut backoff = first_retry;
            loop {
                match replica.server_key().await {
                    Ok(key) => return (id, key),
                    Err(e) => {
                        debug!(replica = id, error = %e, ?backoff, "server key not available yet");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                    }
                }
            }
        })
        .collect();

    let gather = async {
        while let Some((id, key)) = fetches.next().await {
            debug!(replica = id, key = %key, "server key received");
            keys[id] = Some(key);
        }
    };
    let _ = tokio::time::timeout(deadline, gather).await;

    let missing: Vec<usize> = keys
        .iter()
        .enumerate()
        .filter_map(|(id, key)| key.is_none().then_some(id))
        .collect();
    if !missing.is_empty() {
        return Err(KeyExchangeError::Incomplete {
            missing,
            partial: keys,
            waited: deadline,
        });
    }

    info!(replicas = replicas.len(), "all replica keys collected");
    Ok(ReplicaDirectory {
        keys: keys.into_iter().flatten().collect(),
    })
}
