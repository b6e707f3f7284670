//! Errors a replica reports back to the caller.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejection reasons produced by a replica's validation pipeline or ledger.
///
/// Serializable so it can travel inside error responses. The display strings are
/// what clients compare when looking for an error quorum, so they must be stable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BankError {
    #[error("Invalid signature.")]
    AuthenticationFailure,

    #[error("Invalid nonce.")]
    ReplayDetected,

    #[error("Invalid Timestamp. Server is already up to date.")]
    StaleWrite,

    #[error("Invalid proof of work.")]
    SpamRejected,

    #[error("Account exceeded maximum amount of work (anti-spam protection).")]
    WorkLimitExceeded,

    #[error("Account associated with given public key already exists.")]
    AccountAlreadyExists,

    #[error("Account associated with given public key does not exist.")]
    AccountNotFound,

    #[error("Transaction associated with TID does not exist.")]
    TransactionNotFound,

    #[error("Invalid amount. Must be higher than zero.")]
    InvalidAmount,

    #[error("Insufficient balance.")]
    InsufficientBalance,

    #[error("Destination account can't be the same as the source account.")]
    SelfTransferRejected,

    #[error("replica unavailable: {0}")]
    Unavailable(String),
}

impl BankError {
    /// Whether the request was refused before reaching the ledger.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            BankError::AuthenticationFailure
                | BankError::ReplayDetected
                | BankError::StaleWrite
                | BankError::SpamRejected
                | BankError::WorkLimitExceeded
        )
    }
}
