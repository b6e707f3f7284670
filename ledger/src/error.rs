use bftb_types::BankError;
use thiserror::Error;

/// Business-rule failures of ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("account already exists")]
    AccountAlreadyExists,

    #[error("account not found")]
    AccountNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("source and destination are the same account")]
    SelfTransfer,
}

impl LedgerError {
    /// Short stable name, used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            LedgerError::AccountAlreadyExists => "account_exists",
            LedgerError::AccountNotFound => "account_not_found",
            LedgerError::TransactionNotFound => "transaction_not_found",
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::InsufficientBalance => "insufficient_balance",
            LedgerError::SelfTransfer => "self_transfer",
        }
    }
}

impl From<LedgerError> for BankError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountAlreadyExists => BankError::AccountAlreadyExists,
            LedgerError::AccountNotFound => BankError::AccountNotFound,
            LedgerError::TransactionNotFound => BankError::TransactionNotFound,
            LedgerError::InvalidAmount => BankError::InvalidAmount,
            LedgerError::InsufficientBalance => BankError::InsufficientBalance,
            LedgerError::SelfTransfer => BankError::SelfTransferRejected,
        }
    }
}

/// Failures reading or writing ledger snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot decode error: {0}")]
    Decode(String),

    #[error("snapshot hash mismatch")]
    HashMismatch,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}
