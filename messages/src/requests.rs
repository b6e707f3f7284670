//! Client request payloads, one per RPC.

use serde::{Deserialize, Serialize};

use bftb_types::{AccountId, Balance, Nonce, PublicKey, Transaction, TransactionId, WriteTimestamp};

use crate::envelope::{AccountRequest, NoncedRequest, Payload, WriteRequest};

/// Ask a replica for a fresh nonce bound to `account`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRequest {
    pub account: PublicKey,
}

/// Ask a replica for its current ledger timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampRequest {
    pub account: PublicKey,
    pub nonce: Nonce,
}

/// Look up the key of account `account_id`. Unsigned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyByIdRequest {
    pub account_id: AccountId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccountRequest {
    pub account: PublicKey,
    pub timestamp: WriteTimestamp,
    pub nonce: Nonce,
}

/// Transfer `amount` from `account` to `destination`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAmountRequest {
    pub account: PublicKey,
    pub destination: PublicKey,
    pub amount: Balance,
    pub timestamp: WriteTimestamp,
    pub nonce: Nonce,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAccountRequest {
    pub account: PublicKey,
    pub nonce: Nonce,
}

/// Accept pending credit `transaction` into `account`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveAmountRequest {
    pub account: PublicKey,
    pub transaction: TransactionId,
    pub timestamp: WriteTimestamp,
    pub nonce: Nonce,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub account: PublicKey,
    pub nonce: Nonce,
}

/// Push certified pending credits to a lagging replica.
///
/// `timestamp` is the certified ledger timestamp of the read being repaired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBackCheckAccountRequest {
    pub account: PublicKey,
    pub pending_credits: Vec<Transaction>,
    pub timestamp: WriteTimestamp,
    pub nonce: Nonce,
}

/// Push a certified transaction history (and the balance it implies) to a
/// lagging replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBackAuditRequest {
    pub account: PublicKey,
    pub history: Vec<Transaction>,
    pub balance: Balance,
    pub timestamp: WriteTimestamp,
    pub nonce: Nonce,
}

impl Payload for NonceRequest {
    const KIND: &'static str = "nonce";
}

impl AccountRequest for NonceRequest {
    fn account(&self) -> &PublicKey {
        &self.account
    }
}

macro_rules! nonced_request {
    ($ty:ty, $kind:literal) => {
        impl Payload for $ty {
            const KIND: &'static str = $kind;
        }

        impl AccountRequest for $ty {
            fn account(&self) -> &PublicKey {
                &self.account
            }
        }

        impl NoncedRequest for $ty {
            fn nonce(&self) -> Nonce {
                self.nonce
            }
        }
    };
}

macro_rules! write_request {
    ($ty:ty, $kind:literal) => {
        nonced_request!($ty, $kind);

        impl WriteRequest for $ty {
            fn write_timestamp(&self) -> WriteTimestamp {
                self.timestamp
            }
        }
    };
}

nonced_request!(TimestampRequest, "timestamp");
nonced_request!(CheckAccountRequest, "check-account");
nonced_request!(AuditRequest, "audit");
write_request!(OpenAccountRequest, "open-account");
write_request!(SendAmountRequest, "send-amount");
write_request!(ReceiveAmountRequest, "receive-amount");
write_request!(WriteBackCheckAccountRequest, "write-back-check-account");
write_request!(WriteBackAuditRequest, "write-back-audit");
