//! Write-back: pushing a certified read to the replicas that reported an older
//! ledger timestamp.
//!
//! Repairs are signed writes carrying the certified timestamp and a fresh
//! nonce, without proof-of-work. They are best effort: failures are logged and
//! dropped, and the next read of the account will try again.

use futures_util::future::join_all;
use tracing::{debug, info};

use bftb_messages::{
    AuditResponse, CheckAccountResponse, WriteBackAuditRequest, WriteBackCheckAccountRequest,
};
use bftb_types::KeyPair;

use crate::quorum::Certified;
use crate::session::ReplicaHandle;
use crate::ClientSession;

impl ClientSession {
    pub(crate) async fn write_back_check_account(
        &self,
        kp: &KeyPair,
        certified: &Certified<CheckAccountResponse>,
    ) {
        let targets = self.lagging_handles(certified);
        if targets.is_empty() {
            return;
        }
        let account = kp.public.clone();
        let outcomes = join_all(targets.iter().map(|handle| {
            let account = account.clone();
            self.exchange(handle, kp, None, move |nonce| WriteBackCheckAccountRequest {
                account,
                pending_credits: certified.payload.pending_credits.clone(),
                timestamp: certified.timestamp,
                nonce,
            })
        }))
        .await;
        self.log_repairs("check-account", kp, &targets, outcomes);
    }

    pub(crate) async fn write_back_audit(&self, kp: &KeyPair, certified: &Certified<AuditResponse>) {
        let targets = self.lagging_handles(certified);
        if targets.is_empty() {
            return;
        }
        let account = kp.public.clone();
        let outcomes = join_all(targets.iter().map(|handle| {
            let account = account.clone();
            self.exchange(handle, kp, None, move |nonce| WriteBackAuditRequest {
                account,
                history: certified.payload.history.clone(),
                balance: certified.payload.balance,
                timestamp: certified.timestamp,
                nonce,
            })
        }))
        .await;
        self.log_repairs("audit", kp, &targets, outcomes);
    }

    fn lagging_handles<P>(&self, certified: &Certified<P>) -> Vec<&ReplicaHandle> {
        certified
            .lagging()
            .into_iter()
            .filter_map(|index| self.replicas.get(index))
            .collect()
    }

    fn log_repairs<R, E: std::fmt::Display>(
        &self,
        kind: &str,
        kp: &KeyPair,
        targets: &[&ReplicaHandle],
        outcomes: Vec<Result<R, E>>,
    ) {
        for (handle, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(_) => info!(
                    replica = handle.index,
                    account = %kp.public,
                    kind,
                    "write-back applied"
                ),
                Err(e) => debug!(
                    replica = handle.index,
                    account = %kp.public,
                    kind,
                    error = %e,
                    "write-back failed"
                ),
            }
        }
    }
}
