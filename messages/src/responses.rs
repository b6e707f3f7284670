//! Replica response payloads. Each carries the replica's ledger timestamp at
//! the moment it answered.

use serde::{Deserialize, Serialize};

use bftb_types::{AccountId, Balance, Nonce, PublicKey, Transaction, TransactionId, WriteTimestamp};

use crate::envelope::{Payload, ReplicaPayload};

/// The replica's public key. Unsigned: it is what signatures are checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerKeyResponse {
    pub key: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: Nonce,
    pub timestamp: WriteTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampResponse {
    pub timestamp: WriteTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyResponse {
    pub key: PublicKey,
    pub timestamp: WriteTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAccountResponse {
    pub account_id: AccountId,
    pub timestamp: WriteTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAmountResponse {
    pub transaction: TransactionId,
    pub timestamp: WriteTimestamp,
}

/// Balance and pending credits, in transaction id order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckAccountResponse {
    pub balance: Balance,
    pub pending_credits: Vec<Transaction>,
    pub timestamp: WriteTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveAmountResponse {
    pub amount: Balance,
    pub timestamp: WriteTimestamp,
}

/// Completed history in settlement order, plus the current balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResponse {
    pub history: Vec<Transaction>,
    pub balance: Balance,
    pub timestamp: WriteTimestamp,
}

/// Acknowledges a write-back; `applied` counts transactions that changed state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBackResponse {
    pub applied: usize,
    pub timestamp: WriteTimestamp,
}

macro_rules! replica_payload {
    ($ty:ty, $kind:literal) => {
        impl Payload for $ty {
            const KIND: &'static str = $kind;
        }

        impl ReplicaPayload for $ty {
            fn timestamp(&self) -> WriteTimestamp {
                self.timestamp
            }
        }
    };
}

replica_payload!(NonceResponse, "nonce-response");
replica_payload!(TimestampResponse, "timestamp-response");
replica_payload!(PublicKeyResponse, "public-key-response");
replica_payload!(OpenAccountResponse, "open-account-response");
replica_payload!(SendAmountResponse, "send-amount-response");
replica_payload!(CheckAccountResponse, "check-account-response");
replica_payload!(ReceiveAmountResponse, "receive-amount-response");
replica_payload!(AuditResponse, "audit-response");
replica_payload!(WriteBackResponse, "write-back-response");
