//! In-process clusters of nullable replicas.

use std::sync::Arc;

use bftb_crypto::keypair_from_seed;
use bftb_protocol::ReplicaApi;
use bftb_replica::{Replica, ReplicaConfig, ReplicaError};
use bftb_types::KeyPair;

use crate::replica::{Behavior, NullReplica};

/// Leading zero bits of work cluster replicas require. Low enough to keep
/// tests fast, high enough that a missing counter is still caught.
pub const TEST_DIFFICULTY_BITS: u32 = 4;

/// `N` replicas sharing no state, each wrapped in a [`NullReplica`].
pub struct LocalCluster {
    replicas: Vec<Arc<NullReplica>>,
}

impl LocalCluster {
    /// `replicas` in-memory replicas tolerating `faults` Byzantine ones.
    pub fn new(replicas: usize, faults: usize) -> Result<Self, ReplicaError> {
        Self::with_config(ReplicaConfig {
            replicas,
            faults,
            work_difficulty_bits: TEST_DIFFICULTY_BITS,
            ..ReplicaConfig::default()
        })
    }

    /// One replica per id in `0..base.replicas`, each with `base`'s settings.
    pub fn with_config(base: ReplicaConfig) -> Result<Self, ReplicaError> {
        let replicas = (0..base.replicas)
            .map(|id| {
                let config = ReplicaConfig {
                    id,
                    ..base.clone()
                };
                let replica = Replica::open(replica_identity(id), &config)?;
                Ok(Arc::new(NullReplica::new(Arc::new(replica))))
            })
            .collect::<Result<Vec<_>, ReplicaError>>()?;
        Ok(Self { replicas })
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn replica(&self, id: usize) -> &Arc<NullReplica> {
        &self.replicas[id]
    }

    pub fn set_behavior(&self, id: usize, behavior: Behavior) {
        self.replicas[id].set_behavior(behavior);
    }

    /// Every replica as a trait object, in id order.
    pub fn apis(&self) -> Vec<Arc<dyn ReplicaApi>> {
        self.replicas
            .iter()
            .map(|r| Arc::clone(r) as Arc<dyn ReplicaApi>)
            .collect()
    }
}

/// Deterministic signing identity of replica `id`.
pub fn replica_identity(id: usize) -> KeyPair {
    keypair_from_seed(&[0xA0u8.wrapping_add(id as u8); 32])
}
