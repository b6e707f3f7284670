//! Quorum sizing for `N` replicas tolerating `f` Byzantine faults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid replica/fault combination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuorumParamsError {
    #[error("at least one replica is required")]
    NoReplicas,

    #[error("{replicas} replicas cannot tolerate {faults} faults (need at least {required})")]
    TooFewReplicas {
        replicas: usize,
        faults: usize,
        required: usize,
    },
}

/// Replica count and tolerated faults.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumParams {
    replicas: usize,
    faults: usize,
}

impl QuorumParams {
    /// Validate `n >= 2f + 1`.
    pub fn new(replicas: usize, faults: usize) -> Result<Self, QuorumParamsError> {
        if replicas == 0 {
            return Err(QuorumParamsError::NoReplicas);
        }
        let required = 2 * faults + 1;
        if replicas < required {
            return Err(QuorumParamsError::TooFewReplicas {
                replicas,
                faults,
                required,
            });
        }
        Ok(Self { replicas, faults })
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn faults(&self) -> usize {
        self.faults
    }

    /// `T = floor((N + f) / 2)`.
    pub fn threshold(&self) -> usize {
        (self.replicas + self.faults) / 2
    }

    /// A result needs strictly more than `T` agreeing replicas.
    pub fn is_quorum(&self, count: usize) -> bool {
        count > self.threshold()
    }

    /// Smallest number of agreeing replicas that forms a quorum.
    pub fn quorum_size(&self) -> usize {
        self.threshold() + 1
    }
}
