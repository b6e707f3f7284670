use std::time::Duration;

use thiserror::Error;

use bftb_protocol::CallError;
use bftb_types::BankError;

/// Why one replica contributed no response to a round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicaFailure {
    /// The replica refused the request.
    #[error(transparent)]
    Rejected(BankError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The response signature does not verify under the replica's key.
    #[error("response not signed by the replica")]
    ForgedResponse,

    /// Proof-of-work could not be computed locally.
    #[error("proof of work failed: {0}")]
    Work(String),
}

impl From<CallError> for ReplicaFailure {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Rejected(e) => ReplicaFailure::Rejected(e),
            CallError::Transport(msg) => ReplicaFailure::Transport(msg),
        }
    }
}

/// Outcome of a quorum operation that produced no certified value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// More than `T` replicas refused the request for the same reason.
    #[error(transparent)]
    Rejected(BankError),

    /// More than `T` replicas failed identically without a rejection.
    #[error("{0}")]
    Replica(ReplicaFailure),

    #[error("insufficient server quorum: got {received} out of {total} servers")]
    QuorumUnavailable { received: usize, total: usize },

    #[error("config error: {0}")]
    Config(String),

    #[error("keystore error: {0}")]
    Keystore(String),
}

impl ClientError {
    /// The replicas' shared rejection, if that is what this is.
    pub fn rejection(&self) -> Option<&BankError> {
        match self {
            ClientError::Rejected(e) => Some(e),
            ClientError::Replica(ReplicaFailure::Rejected(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<ReplicaFailure> for ClientError {
    fn from(failure: ReplicaFailure) -> Self {
        match failure {
            ReplicaFailure::Rejected(e) => ClientError::Rejected(e),
            other => ClientError::Replica(other),
        }
    }
}
