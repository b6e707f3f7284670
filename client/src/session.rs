//! Quorum coordination for one client.
//!
//! A [`ClientSession`] owns its replica handles and its highest-seen write
//! timestamp. Every operation fans out to all replicas concurrently, each call
//! bounded by the per-replica deadline, and certifies the result with a
//! [`Tally`]. Independent sessions share nothing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use bftb_messages::{
    AuditRequest, CheckAccountRequest, NonceRequest, NoncedRequest, OpenAccountRequest,
    PublicKeyByIdRequest, ReceiveAmountRequest, ReplicaPayload, SendAmountRequest, SignedRequest,
    SignedResponse, TimestampRequest,
};
use bftb_protocol::{collect_replica_keys, CallError, KeyExchangeError, ReplicaApi};
use bftb_types::{
    AccountId, Balance, KeyPair, Nonce, PublicKey, QuorumParams, Transaction, TransactionId,
    WriteTimestamp,
};
use bftb_work::{Difficulty, WorkGenerator};

use crate::exchange::Exchange;
use crate::quorum::{Certified, Tally};
use crate::{ClientConfig, ClientError, HttpReplica, ReplicaFailure};

/// Tuning for a session.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub faults: usize,
    /// Deadline for each individual call to one replica.
    pub request_timeout: Duration,
    pub difficulty: Difficulty,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            faults: 1,
            request_timeout: Duration::from_secs(5),
            difficulty: Difficulty::DEFAULT,
        }
    }
}

/// Balance and pending credits of an account, as certified by a quorum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountStatement {
    pub balance: Balance,
    pub pending_credits: Vec<Transaction>,
}

pub(crate) struct ReplicaHandle {
    pub(crate) index: usize,
    pub(crate) api: Arc<dyn ReplicaApi>,
    key: OnceCell<PublicKey>,
}

pub struct ClientSession {
    pub(crate) replicas: Vec<ReplicaHandle>,
    pub(crate) params: QuorumParams,
    pub(crate) request_timeout: Duration,
    difficulty: Difficulty,
    highest_timestamp: Mutex<WriteTimestamp>,
}

impl ClientSession {
    pub fn new(
        replicas: Vec<Arc<dyn ReplicaApi>>,
        options: SessionOptions,
    ) -> Result<Self, ClientError> {
        let params = QuorumParams::new(replicas.len(), options.faults)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        Ok(Self {
            replicas: replicas
                .into_iter()
                .enumerate()
                .map(|(index, api)| ReplicaHandle {
                    index,
                    api,
                    key: OnceCell::new(),
                })
                .collect(),
            params,
            request_timeout: options.request_timeout,
            difficulty: options.difficulty,
            highest_timestamp: Mutex::new(WriteTimestamp::ZERO),
        })
    }

    /// A session talking HTTP to the replicas in `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        config.quorum_params()?;
        let replicas = config
            .replica_urls
            .iter()
            .map(|url| {
                HttpReplica::new(url.clone(), config.request_timeout())
                    .map(|r| Arc::new(r) as Arc<dyn ReplicaApi>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(
            replicas,
            SessionOptions {
                faults: config.faults,
                request_timeout: config.request_timeout(),
                difficulty: config.difficulty()?,
            },
        )
    }

    pub fn params(&self) -> QuorumParams {
        self.params
    }

    /// Highest write timestamp this session has used.
    pub async fn highest_timestamp(&self) -> WriteTimestamp {
        *self.highest_timestamp.lock().await
    }

    /// Fetch every replica's key up front, waiting at most `deadline`.
    ///
    /// Keys that did arrive are kept even when some are missing.
    pub async fn prefetch_keys(&self, deadline: Duration) -> Result<(), KeyExchangeError> {
        let apis: Vec<Arc<dyn ReplicaApi>> =
            self.replicas.iter().map(|h| Arc::clone(&h.api)).collect();
        let retry = (deadline / 10).max(Duration::from_millis(10));
        let keys = match collect_replica_keys(&apis, deadline, retry).await {
            Ok(directory) => directory.keys().iter().cloned().map(Some).collect(),
            Err(KeyExchangeError::Incomplete {
                missing,
                partial,
                waited,
            }) => {
                self.remember_keys(partial.clone());
                return Err(KeyExchangeError::Incomplete {
                    missing,
                    partial,
                    waited,
                });
            }
        };
        self.remember_keys(keys);
        Ok(())
    }

    fn remember_keys(&self, keys: Vec<Option<PublicKey>>) {
        for (handle, key) in self.replicas.iter().zip(keys) {
            if let Some(key) = key {
                let _ = handle.key.set(key);
            }
        }
    }

    // ── Operations ──────────────────────────────────────────────────────

    pub async fn open_account(&self, kp: &KeyPair) -> Result<AccountId, ClientError> {
        let account = kp.public.clone();
        let certified = self
            .write(kp, move |nonce, timestamp| OpenAccountRequest {
                account: account.clone(),
                timestamp,
                nonce,
            })
            .await?;
        info!(account = %kp.public, id = %certified.payload.account_id, "account opened");
        Ok(certified.payload.account_id)
    }

    pub async fn send_amount(
        &self,
        kp: &KeyPair,
        destination: &PublicKey,
        amount: Balance,
    ) -> Result<TransactionId, ClientError> {
        let account = kp.public.clone();
        let destination = destination.clone();
        let certified = self
            .write(kp, move |nonce, timestamp| SendAmountRequest {
                account: account.clone(),
                destination: destination.clone(),
                amount,
                timestamp,
                nonce,
            })
            .await?;
        Ok(certified.payload.transaction)
    }

    pub async fn receive_amount(
        &self,
        kp: &KeyPair,
        transaction: TransactionId,
    ) -> Result<Balance, ClientError> {
        let account = kp.public.clone();
        let certified = self
            .write(kp, move |nonce, timestamp| ReceiveAmountRequest {
                account: account.clone(),
                transaction,
                timestamp,
                nonce,
            })
            .await?;
        Ok(certified.payload.amount)
    }

    /// Certified balance and pending credits. Lagging replicas are repaired
    /// before this returns.
    pub async fn check_account(&self, kp: &KeyPair) -> Result<AccountStatement, ClientError> {
        let account = kp.public.clone();
        let certified = self
            .read(kp, move |nonce| CheckAccountRequest {
                account: account.clone(),
                nonce,
            })
            .await?;
        self.write_back_check_account(kp, &certified).await;
        Ok(AccountStatement {
            balance: certified.payload.balance,
            pending_credits: certified.payload.pending_credits,
        })
    }

    /// Certified transaction history in settlement order. Lagging replicas are
    /// repaired before this returns.
    pub async fn audit(&self, kp: &KeyPair) -> Result<Vec<Transaction>, ClientError> {
        let account = kp.public.clone();
        let certified = self
            .read(kp, move |nonce| AuditRequest {
                account: account.clone(),
                nonce,
            })
            .await?;
        self.write_back_audit(kp, &certified).await;
        Ok(certified.payload.history)
    }

    /// Key of account `id`, as certified by a quorum.
    pub async fn public_key_by_id(&self, id: AccountId) -> Result<PublicKey, ClientError> {
        let outcomes = join_all(self.replicas.iter().map(|handle| async move {
            let key = self.replica_key(handle).await?;
            let response = self
                .call(handle.api.public_key_by_id(PublicKeyByIdRequest { account_id: id }))
                .await?;
            verified(response, &key)
        }))
        .await;
        Ok(self.tally(outcomes)?.payload.key)
    }

    // ── Rounds ──────────────────────────────────────────────────────────

    /// Query every replica's ledger timestamp and step past the highest.
    async fn next_write_timestamp(&self, kp: &KeyPair) -> WriteTimestamp {
        let account = kp.public.clone();
        let outcomes = join_all(self.replicas.iter().map(|handle| {
            let account = account.clone();
            self.exchange(handle, kp, None, move |nonce| TimestampRequest {
                account: account.clone(),
                nonce,
            })
        }))
        .await;
        let reported = outcomes
            .into_iter()
            .filter_map(Result::ok)
            .map(|r| r.timestamp)
            .max()
            .unwrap_or(WriteTimestamp::ZERO);

        let mut highest = self.highest_timestamp.lock().await;
        *highest = (*highest).max(reported).next();
        *highest
    }

    async fn write<P, F>(&self, kp: &KeyPair, make: F) -> Result<Certified<P::Response>, ClientError>
    where
        P: Exchange + NoncedRequest,
        P::Response: Clone,
        F: Fn(Nonce, WriteTimestamp) -> P + Send + Sync,
    {
        let timestamp = self.next_write_timestamp(kp).await;
        debug!(account = %kp.public, op = P::KIND, %timestamp, "write round");
        let make = &make;
        let outcomes = join_all(self.replicas.iter().map(|handle| {
            self.exchange(handle, kp, Some(self.difficulty), move |nonce| {
                make(nonce, timestamp)
            })
        }))
        .await;
        self.tally(outcomes)
    }

    async fn read<P, F>(&self, kp: &KeyPair, make: F) -> Result<Certified<P::Response>, ClientError>
    where
        P: Exchange + NoncedRequest,
        P::Response: Clone,
        F: Fn(Nonce) -> P + Send + Sync,
    {
        let make = &make;
        let outcomes = join_all(
            self.replicas
                .iter()
                .map(|handle| self.exchange(handle, kp, None, make)),
        )
        .await;
        self.tally(outcomes)
    }

    fn tally<R>(&self, outcomes: Vec<Result<R, ReplicaFailure>>) -> Result<Certified<R>, ClientError>
    where
        R: ReplicaPayload + PartialEq + Clone,
    {
        let mut tally = Tally::new(self.params);
        for (index, outcome) in outcomes.into_iter().enumerate() {
            if let Err(failure) = &outcome {
                debug!(replica = index, error = %failure, "replica failed");
            }
            tally.record(index, outcome);
        }
        tally.finish()
    }

    // ── One replica ─────────────────────────────────────────────────────

    /// Nonce, sign, optional work, submit, verify: one request to one replica.
    pub(crate) async fn exchange<P, F>(
        &self,
        handle: &ReplicaHandle,
        kp: &KeyPair,
        work: Option<Difficulty>,
        make: F,
    ) -> Result<P::Response, ReplicaFailure>
    where
        P: Exchange,
        F: FnOnce(Nonce) -> P,
    {
        let key = self.replica_key(handle).await?;
        let nonce = self.fetch_nonce(handle, &key, kp).await?;
        let payload = make(nonce);
        let request = match work {
            Some(difficulty) => {
                let bytes = payload.signing_bytes();
                let counter =
                    tokio::task::spawn_blocking(move || WorkGenerator.generate(&bytes, difficulty))
                        .await
                        .map_err(|e| ReplicaFailure::Work(e.to_string()))?
                        .map_err(|e| ReplicaFailure::Work(e.to_string()))?;
                SignedRequest::sign(payload, &kp.private).with_work(counter.0)
            }
            None => SignedRequest::sign(payload, &kp.private),
        };
        let response = self.call(P::submit(handle.api.as_ref(), request)).await?;
        verified(response, &key)
    }

    async fn fetch_nonce(
        &self,
        handle: &ReplicaHandle,
        replica_key: &PublicKey,
        kp: &KeyPair,
    ) -> Result<Nonce, ReplicaFailure> {
        let request = SignedRequest::sign(
            NonceRequest {
                account: kp.public.clone(),
            },
            &kp.private,
        );
        let response = self.call(handle.api.generate_nonce(request)).await?;
        Ok(verified(response, replica_key)?.nonce)
    }

    async fn replica_key(&self, handle: &ReplicaHandle) -> Result<PublicKey, ReplicaFailure> {
        handle
            .key
            .get_or_try_init(|| self.call(handle.api.server_key()))
            .await
            .cloned()
    }

    /// Run one call under the per-replica deadline.
    async fn call<T>(
        &self,
        call: impl Future<Output = Result<T, CallError>>,
    ) -> Result<T, ReplicaFailure> {
        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result.map_err(ReplicaFailure::from),
            Err(_) => Err(ReplicaFailure::Timeout(self.request_timeout)),
        }
    }
}

fn verified<R: ReplicaPayload>(
    response: SignedResponse<R>,
    replica_key: &PublicKey,
) -> Result<R, ReplicaFailure> {
    response
        .into_verified(replica_key)
        .ok_or(ReplicaFailure::ForgedResponse)
}
