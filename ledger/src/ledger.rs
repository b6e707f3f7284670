//! Ledger operations: account creation, transfers, balance queries, audit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use bftb_types::{AccountId, Balance, PublicKey, Transaction, TransactionId, WriteTimestamp};

use crate::{Account, LedgerError};

/// Starting balance granted on account creation.
pub const DEFAULT_ENDOWMENT: Balance = 50;

/// One replica's ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    pub(crate) endowment: Balance,
    pub(crate) timestamp: WriteTimestamp,
    pub(crate) next_account_id: AccountId,
    pub(crate) next_transaction_id: TransactionId,
    pub(crate) accounts: BTreeMap<PublicKey, Account>,
    pub(crate) transactions: BTreeMap<TransactionId, Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(DEFAULT_ENDOWMENT)
    }
}

impl Ledger {
    pub fn new(endowment: Balance) -> Self {
        Self {
            endowment,
            timestamp: WriteTimestamp::ZERO,
            next_account_id: AccountId(0),
            next_transaction_id: TransactionId(0),
            accounts: BTreeMap::new(),
            transactions: BTreeMap::new(),
        }
    }

    pub fn endowment(&self) -> Balance {
        self.endowment
    }

    /// Current ledger-wide write timestamp.
    pub fn timestamp(&self) -> WriteTimestamp {
        self.timestamp
    }

    /// Adopt `candidate` if it is strictly greater than the current timestamp.
    ///
    /// Returns `false` (and changes nothing) otherwise.
    pub fn advance_timestamp(&mut self, candidate: WriteTimestamp) -> bool {
        if candidate <= self.timestamp {
            return false;
        }
        self.timestamp = candidate;
        true
    }

    pub fn account(&self, key: &PublicKey) -> Option<&Account> {
        self.accounts.get(key)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub(crate) fn existing(&self, key: &PublicKey) -> Result<&Account, LedgerError> {
        self.accounts.get(key).ok_or(LedgerError::AccountNotFound)
    }

    fn existing_mut(&mut self, key: &PublicKey) -> Result<&mut Account, LedgerError> {
        self.accounts.get_mut(key).ok_or(LedgerError::AccountNotFound)
    }

    fn resolve<'a>(&'a self, ids: impl Iterator<Item = TransactionId> + 'a) -> Vec<Transaction> {
        ids.filter_map(|id| self.transactions.get(&id).cloned())
            .collect()
    }

    /// Create an account for `key` with the endowment as its balance.
    pub fn open_account(&mut self, key: PublicKey) -> Result<AccountId, LedgerError> {
        if self.accounts.contains_key(&key) {
            return Err(LedgerError::AccountAlreadyExists);
        }
        let id = self.next_account_id;
        self.next_account_id = id.next();
        debug!(account = %key, %id, "account opened");
        self.accounts
            .insert(key.clone(), Account::new(key, id, self.endowment));
        Ok(id)
    }

    /// Earmark `amount` from `source` for `destination`.
    ///
    /// Checks run in a fixed order: amount, existence, self-transfer, balance.
    /// On success the source balance drops immediately and the transfer sits in
    /// both parties' pending sets until the destination accepts it.
    pub fn send_amount(
        &mut self,
        source: &PublicKey,
        destination: &PublicKey,
        amount: Balance,
    ) -> Result<TransactionId, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let src_balance = self.existing(source)?.balance;
        self.existing(destination)?;
        if source == destination {
            return Err(LedgerError::SelfTransfer);
        }
        if amount > src_balance {
            return Err(LedgerError::InsufficientBalance);
        }

        let id = self.next_transaction_id;
        self.next_transaction_id = id.next();
        self.transactions.insert(
            id,
            Transaction {
                id,
                source: source.clone(),
                destination: destination.clone(),
                amount,
            },
        );

        let src = self.existing_mut(source)?;
        src.balance -= amount;
        src.pending_withdrawals.insert(id);
        self.existing_mut(destination)?.pending_credits.insert(id);

        debug!(%source, %destination, amount, %id, "transfer pending");
        Ok(id)
    }

    pub fn check_account_balance(&self, key: &PublicKey) -> Result<Balance, LedgerError> {
        Ok(self.existing(key)?.balance)
    }

    /// Pending credits in transaction id order.
    pub fn check_account_credits(&self, key: &PublicKey) -> Result<Vec<Transaction>, LedgerError> {
        let account = self.existing(key)?;
        Ok(self.resolve(account.pending_credits()))
    }

    /// Accept pending credit `id` into `key`'s balance.
    ///
    /// Fails with `TransactionNotFound` unless the receiver holds the credit and
    /// the sender still holds the matching pending withdrawal. Returns the amount.
    pub fn receive_amount(
        &mut self,
        key: &PublicKey,
        id: TransactionId,
    ) -> Result<Balance, LedgerError> {
        let account = self.existing(key)?;
        if !account.pending_credits.contains(&id) {
            return Err(LedgerError::TransactionNotFound);
        }
        let tx = self
            .transactions
            .get(&id)
            .cloned()
            .ok_or(LedgerError::TransactionNotFound)?;
        let source = self.existing(&tx.source)?;
        if !source.pending_withdrawals.contains(&id) {
            return Err(LedgerError::TransactionNotFound);
        }

        let receiver = self.existing_mut(key)?;
        receiver.pending_credits.remove(&id);
        receiver.balance += tx.amount;
        receiver.history.push(id);

        let sender = self.existing_mut(&tx.source)?;
        sender.pending_withdrawals.remove(&id);
        sender.history.push(id);

        debug!(account = %key, %id, amount = tx.amount, "transfer completed");
        Ok(tx.amount)
    }

    /// Completed transactions in settlement order.
    pub fn audit(&self, key: &PublicKey) -> Result<Vec<Transaction>, LedgerError> {
        let account = self.existing(key)?;
        Ok(self.resolve(account.history.iter().copied()))
    }

    pub fn public_key_by_id(&self, id: AccountId) -> Result<PublicKey, LedgerError> {
        self.accounts
            .values()
            .find(|account| account.id == id)
            .map(|account| account.key.clone())
            .ok_or(LedgerError::AccountNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> PublicKey {
        PublicKey([b; 32])
    }

    fn ledger_with(keys: &[u8]) -> Ledger {
        let mut ledger = Ledger::default();
        for k in keys {
            ledger.open_account(key(*k)).unwrap();
        }
        ledger
    }

    #[test]
    fn open_account_grants_endowment() {
        let mut ledger = Ledger::default();
        let id = ledger.open_account(key(1)).unwrap();
        assert_eq!(id, AccountId(0));
        assert_eq!(ledger.check_account_balance(&key(1)).unwrap(), DEFAULT_ENDOWMENT);
        assert!(ledger.check_account_credits(&key(1)).unwrap().is_empty());
        assert_eq!(ledger.open_account(key(2)).unwrap(), AccountId(1));
    }

    #[test]
    fn open_account_twice_fails() {
        let mut ledger = ledger_with(&[1]);
        assert_eq!(
            ledger.open_account(key(1)),
            Err(LedgerError::AccountAlreadyExists)
        );
        assert_eq!(ledger.account_count(), 1);
    }

    #[test]
    fn sends_earmark_source_and_pend_destination() {
        let mut ledger = ledger_with(&[1, 2]);
        let t3 = ledger.send_amount(&key(1), &key(2), 3).unwrap();
        let t6 = ledger.send_amount(&key(1), &key(2), 6).unwrap();

        assert_eq!(ledger.check_account_balance(&key(1)).unwrap(), DEFAULT_ENDOWMENT - 9);
        assert!(ledger.check_account_credits(&key(1)).unwrap().is_empty());
        assert_eq!(ledger.check_account_balance(&key(2)).unwrap(), DEFAULT_ENDOWMENT);

        let credits = ledger.check_account_credits(&key(2)).unwrap();
        let amounts: Vec<_> = credits.iter().map(|t| (t.id, t.amount)).collect();
        assert_eq!(amounts, vec![(t3, 3), (t6, 6)]);
        assert!(credits.iter().all(|t| t.source == key(1)));
    }

    #[test]
    fn receive_in_any_order_settles_history_in_acceptance_order() {
        let mut ledger = ledger_with(&[1, 2]);
        let t3 = ledger.send_amount(&key(1), &key(2), 3).unwrap();
        let t6 = ledger.send_amount(&key(1), &key(2), 6).unwrap();

        assert_eq!(ledger.receive_amount(&key(2), t6).unwrap(), 6);
        assert_eq!(ledger.receive_amount(&key(2), t3).unwrap(), 3);

        assert_eq!(ledger.check_account_balance(&key(2)).unwrap(), DEFAULT_ENDOWMENT + 9);
        let history: Vec<_> = ledger
            .audit(&key(2))
            .unwrap()
            .into_iter()
            .map(|t| (t.source, t.destination, t.amount))
            .collect();
        assert_eq!(history, vec![(key(1), key(2), 6), (key(1), key(2), 3)]);
        assert_eq!(ledger.audit(&key(1)).unwrap().len(), 2);
        assert_eq!(ledger.account(&key(1)).unwrap().pending_withdrawals().count(), 0);
    }

    #[test]
    fn send_checks_amount_before_existence() {
        let mut ledger = ledger_with(&[1]);
        assert_eq!(
            ledger.send_amount(&key(1), &key(9), 0),
            Err(LedgerError::InvalidAmount)
        );
        assert_eq!(
            ledger.send_amount(&key(1), &key(9), 5),
            Err(LedgerError::AccountNotFound)
        );
    }

    #[test]
    fn insufficient_balance_leaves_state_unchanged() {
        let mut ledger = ledger_with(&[1, 2]);
        let before = ledger.clone();
        assert_eq!(
            ledger.send_amount(&key(1), &key(2), DEFAULT_ENDOWMENT + 1),
            Err(LedgerError::InsufficientBalance)
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn maximal_amount_is_insufficient_balance() {
        let mut ledger = ledger_with(&[1, 2]);
        ledger.send_amount(&key(1), &key(2), DEFAULT_ENDOWMENT).unwrap();
        let before = ledger.clone();
        assert_eq!(
            ledger.send_amount(&key(1), &key(2), Balance::MAX),
            Err(LedgerError::InsufficientBalance)
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn spending_exact_balance_is_allowed() {
        let mut ledger = ledger_with(&[1, 2]);
        ledger.send_amount(&key(1), &key(2), DEFAULT_ENDOWMENT).unwrap();
        assert_eq!(ledger.check_account_balance(&key(1)).unwrap(), 0);
    }

    #[test]
    fn self_transfer_leaves_state_unchanged() {
        let mut ledger = ledger_with(&[1]);
        let before = ledger.clone();
        assert_eq!(
            ledger.send_amount(&key(1), &key(1), 5),
            Err(LedgerError::SelfTransfer)
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn receive_unknown_transaction_fails() {
        let mut ledger = ledger_with(&[1, 2]);
        assert_eq!(
            ledger.receive_amount(&key(2), TransactionId(42)),
            Err(LedgerError::TransactionNotFound)
        );
        assert_eq!(
            ledger.receive_amount(&key(3), TransactionId(0)),
            Err(LedgerError::AccountNotFound)
        );
    }

    #[test]
    fn receive_requires_matching_pending_withdrawal() {
        let mut ledger = ledger_with(&[1, 2]);
        let id = ledger.send_amount(&key(1), &key(2), 4).unwrap();
        // The receiver still has the credit, but the source-side half is gone.
        ledger
            .accounts
            .get_mut(&key(1))
            .unwrap()
            .pending_withdrawals
            .remove(&id);

        assert_eq!(
            ledger.receive_amount(&key(2), id),
            Err(LedgerError::TransactionNotFound)
        );
        assert_eq!(ledger.check_account_balance(&key(2)).unwrap(), DEFAULT_ENDOWMENT);
    }

    #[test]
    fn receive_twice_fails() {
        let mut ledger = ledger_with(&[1, 2]);
        let id = ledger.send_amount(&key(1), &key(2), 4).unwrap();
        ledger.receive_amount(&key(2), id).unwrap();
        assert_eq!(
            ledger.receive_amount(&key(2), id),
            Err(LedgerError::TransactionNotFound)
        );
    }

    #[test]
    fn only_the_destination_can_receive() {
        let mut ledger = ledger_with(&[1, 2]);
        let id = ledger.send_amount(&key(1), &key(2), 4).unwrap();
        assert_eq!(
            ledger.receive_amount(&key(1), id),
            Err(LedgerError::TransactionNotFound)
        );
    }

    #[test]
    fn timestamp_only_moves_forward() {
        let mut ledger = Ledger::default();
        assert!(ledger.advance_timestamp(WriteTimestamp::new(3)));
        assert!(!ledger.advance_timestamp(WriteTimestamp::new(3)));
        assert!(!ledger.advance_timestamp(WriteTimestamp::new(2)));
        assert_eq!(ledger.timestamp(), WriteTimestamp::new(3));
    }

    #[test]
    fn public_key_lookup_by_id() {
        let ledger = ledger_with(&[1, 2]);
        assert_eq!(ledger.public_key_by_id(AccountId(1)).unwrap(), key(2));
        assert_eq!(
            ledger.public_key_by_id(AccountId(7)),
            Err(LedgerError::AccountNotFound)
        );
    }

    #[test]
    fn missing_account_queries_fail() {
        let ledger = Ledger::default();
        assert_eq!(
            ledger.check_account_balance(&key(1)),
            Err(LedgerError::AccountNotFound)
        );
        assert_eq!(ledger.audit(&key(1)), Err(LedgerError::AccountNotFound));
    }
}
