//! Transfer records.

use serde::{Deserialize, Serialize};

use crate::{PublicKey, TransactionId};

/// Account balance. Signed, with earmarked funds already subtracted.
pub type Balance = i64;

/// An immutable transfer between two accounts.
///
/// A transaction is created once by `send_amount` and never changes afterwards;
/// accounts refer to it only by id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub source: PublicKey,
    pub destination: PublicKey,
    pub amount: Balance,
}

impl Transaction {
    /// Whether `key` is the source or the destination.
    pub fn involves(&self, key: &PublicKey) -> bool {
        self.source == *key || self.destination == *key
    }
}
