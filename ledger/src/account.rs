//! A single account's record on one replica.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use bftb_types::{AccountId, Balance, PublicKey, TransactionId};

/// Account state. Holds only transaction ids; the transactions themselves live
/// in the ledger's transaction map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub key: PublicKey,
    pub id: AccountId,
    /// Endowment plus completed credits minus completed and earmarked withdrawals.
    pub(crate) balance: Balance,
    /// Completed transactions in settlement order.
    pub(crate) history: Vec<TransactionId>,
    /// Sent, funds already deducted, not yet accepted by the receiver.
    pub(crate) pending_withdrawals: BTreeSet<TransactionId>,
    /// Received, not yet accepted.
    pub(crate) pending_credits: BTreeSet<TransactionId>,
}

impl Account {
    pub(crate) fn new(key: PublicKey, id: AccountId, endowment: Balance) -> Self {
        Self {
            key,
            id,
            balance: endowment,
            history: Vec::new(),
            pending_withdrawals: BTreeSet::new(),
            pending_credits: BTreeSet::new(),
        }
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    pub fn history(&self) -> &[TransactionId] {
        &self.history
    }

    pub fn pending_withdrawals(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.pending_withdrawals.iter().copied()
    }

    pub fn pending_credits(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.pending_credits.iter().copied()
    }

    pub fn has_completed(&self, id: TransactionId) -> bool {
        self.history.contains(&id)
    }

    /// Whether the account references `id` anywhere.
    pub fn knows(&self, id: TransactionId) -> bool {
        self.pending_withdrawals.contains(&id)
            || self.pending_credits.contains(&id)
            || self.has_completed(id)
    }
}
