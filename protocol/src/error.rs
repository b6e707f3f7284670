use bftb_types::BankError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of a single call to a single replica that produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CallError {
    /// The replica answered with a rejection.
    #[error(transparent)]
    Rejected(#[from] BankError),

    /// The replica could not be reached or answered with something unreadable.
    #[error("transport error: {0}")]
    Transport(String),
}
