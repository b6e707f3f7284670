use thiserror::Error;

/// Failures starting or configuring a replica.
#[derive(Debug, Error)]
pub enum ReplicaError {
    #[error("config error: {0}")]
    Config(String),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] bftb_ledger::SnapshotError),

    #[error("invalid quorum parameters: {0}")]
    Quorum(#[from] bftb_types::QuorumParamsError),

    #[error("work error: {0}")]
    Work(#[from] bftb_work::WorkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
