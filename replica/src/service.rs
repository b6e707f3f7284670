//! The replica service: validated operations over one ledger.
//!
//! Lock order is always ledger, then nonces, then throttle. Writes hold the
//! ledger's exclusive lock from the first validation stage until the snapshot
//! is on disk, so validation and mutation are atomic with respect to every
//! other request.

use std::time::Instant;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use bftb_ledger::{Ledger, LedgerError, SnapshotStore};
use bftb_messages::{
    AccountRequest, AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse,
    NonceRequest, NonceResponse, NoncedRequest, OpenAccountRequest, OpenAccountResponse, Payload,
    PublicKeyByIdRequest, PublicKeyResponse, ReceiveAmountRequest, ReceiveAmountResponse,
    ReplicaPayload, SendAmountRequest, SendAmountResponse, SignedRequest, SignedResponse,
    TimestampRequest, TimestampResponse, WriteBackAuditRequest, WriteBackCheckAccountRequest,
    WriteBackResponse, WriteRequest,
};
use bftb_types::{BankError, KeyPair, PublicKey, WriteTimestamp};

use crate::validator::WriteContext;
use crate::{
    NonceTable, ReplicaConfig, ReplicaError, ReplicaMetrics, RequestValidator, ValidationError,
    WriteKind, WriteThrottle,
};

pub struct Replica {
    id: usize,
    identity: KeyPair,
    validator: RequestValidator,
    ledger: RwLock<Ledger>,
    nonces: Mutex<NonceTable>,
    throttle: Option<Mutex<WriteThrottle>>,
    store: Option<SnapshotStore>,
    metrics: ReplicaMetrics,
}

impl Replica {
    /// Build replica `config.id`, restoring its ledger from the data directory
    /// when one is configured and holds a snapshot.
    pub fn open(identity: KeyPair, config: &ReplicaConfig) -> Result<Self, ReplicaError> {
        config.validate()?;
        let store = config
            .data_dir
            .as_ref()
            .map(|dir| SnapshotStore::new(dir, config.id));
        let ledger = match &store {
            Some(store) => match store.load()? {
                Some(ledger) => {
                    info!(
                        replica = config.id,
                        accounts = ledger.account_count(),
                        timestamp = %ledger.timestamp(),
                        "ledger restored from snapshot"
                    );
                    ledger
                }
                None => Ledger::new(config.endowment),
            },
            None => Ledger::new(config.endowment),
        };

        let metrics = ReplicaMetrics::new();
        metrics.account_count.set(ledger.account_count() as i64);
        metrics.ledger_timestamp.set(ledger.timestamp().value() as i64);

        Ok(Self {
            id: config.id,
            identity,
            validator: RequestValidator::new(config.difficulty()?),
            ledger: RwLock::new(ledger),
            nonces: Mutex::new(NonceTable::with_max_keys(config.max_nonce_keys)),
            throttle: config.throttle.map(|t| Mutex::new(WriteThrottle::new(t))),
            store,
            metrics,
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The key every response from this replica is signed with.
    pub fn server_key(&self) -> &PublicKey {
        &self.identity.public
    }

    pub fn metrics(&self) -> &ReplicaMetrics {
        &self.metrics
    }

    pub fn sign_response<R: ReplicaPayload>(&self, payload: R) -> SignedResponse<R> {
        SignedResponse::sign(payload, &self.identity.private)
    }

    pub async fn ledger_timestamp(&self) -> WriteTimestamp {
        self.ledger.read().await.timestamp()
    }

    /// A copy of the current ledger.
    pub async fn ledger_snapshot(&self) -> Ledger {
        self.ledger.read().await.clone()
    }

    // ── Unordered operations ────────────────────────────────────────────

    pub async fn generate_nonce(
        &self,
        request: SignedRequest<NonceRequest>,
    ) -> Result<SignedResponse<NonceResponse>, BankError> {
        if let Err(e) = self.validator.admit_nonce_request(&request) {
            self.reject::<NonceRequest>(request.payload.account(), &e);
            return Err(e.into());
        }
        let ledger = self.ledger.read().await;
        let mut nonces = self.nonces.lock().await;
        let nonce = nonces.issue(&request.payload.account);
        self.metrics.nonces_issued.inc();
        self.metrics.outstanding_nonces.set(nonces.outstanding() as i64);
        Ok(self.sign_response(NonceResponse {
            nonce,
            timestamp: ledger.timestamp(),
        }))
    }

    pub async fn get_timestamp(
        &self,
        request: SignedRequest<TimestampRequest>,
    ) -> Result<SignedResponse<TimestampResponse>, BankError> {
        self.execute_read(request, |ledger, _| {
            Ok(TimestampResponse {
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    pub async fn public_key_by_id(
        &self,
        request: PublicKeyByIdRequest,
    ) -> Result<SignedResponse<PublicKeyResponse>, BankError> {
        let ledger = self.ledger.read().await;
        let key = ledger.public_key_by_id(request.account_id)?;
        self.metrics.reads_served.inc();
        Ok(self.sign_response(PublicKeyResponse {
            key,
            timestamp: ledger.timestamp(),
        }))
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub async fn check_account(
        &self,
        request: SignedRequest<CheckAccountRequest>,
    ) -> Result<SignedResponse<CheckAccountResponse>, BankError> {
        self.execute_read(request, |ledger, payload| {
            Ok(CheckAccountResponse {
                balance: ledger.check_account_balance(&payload.account)?,
                pending_credits: ledger.check_account_credits(&payload.account)?,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    pub async fn audit(
        &self,
        request: SignedRequest<AuditRequest>,
    ) -> Result<SignedResponse<AuditResponse>, BankError> {
        self.execute_read(request, |ledger, payload| {
            Ok(AuditResponse {
                history: ledger.audit(&payload.account)?,
                balance: ledger.check_account_balance(&payload.account)?,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub async fn open_account(
        &self,
        request: SignedRequest<OpenAccountRequest>,
    ) -> Result<SignedResponse<OpenAccountResponse>, BankError> {
        self.execute_write(request, WriteKind::Operation, |ledger, payload| {
            Ok(OpenAccountResponse {
                account_id: ledger.open_account(payload.account.clone())?,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    pub async fn send_amount(
        &self,
        request: SignedRequest<SendAmountRequest>,
    ) -> Result<SignedResponse<SendAmountResponse>, BankError> {
        self.execute_write(request, WriteKind::Operation, |ledger, payload| {
            Ok(SendAmountResponse {
                transaction: ledger.send_amount(
                    &payload.account,
                    &payload.destination,
                    payload.amount,
                )?,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    pub async fn receive_amount(
        &self,
        request: SignedRequest<ReceiveAmountRequest>,
    ) -> Result<SignedResponse<ReceiveAmountResponse>, BankError> {
        self.execute_write(request, WriteKind::Operation, |ledger, payload| {
            Ok(ReceiveAmountResponse {
                amount: ledger.receive_amount(&payload.account, payload.transaction)?,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    // ── Write-back ──────────────────────────────────────────────────────

    pub async fn write_back_check_account(
        &self,
        request: SignedRequest<WriteBackCheckAccountRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, BankError> {
        self.execute_write(request, WriteKind::Repair, |ledger, payload| {
            let mut applied = 0;
            for tx in &payload.pending_credits {
                if ledger.add_pending_transaction(&payload.account, tx)? {
                    applied += 1;
                }
            }
            Ok(WriteBackResponse {
                applied,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    pub async fn write_back_audit(
        &self,
        request: SignedRequest<WriteBackAuditRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, BankError> {
        let id = self.id;
        self.execute_write(request, WriteKind::Repair, move |ledger, payload| {
            let mut applied = 0;
            for tx in &payload.history {
                if ledger.add_transaction(&payload.account, tx)? {
                    applied += 1;
                }
            }
            let balance = ledger.check_account_balance(&payload.account)?;
            if balance != payload.balance {
                warn!(
                    replica = id,
                    account = %payload.account,
                    local = balance,
                    certified = payload.balance,
                    "balance differs from certified balance after write-back"
                );
            }
            Ok(WriteBackResponse {
                applied,
                timestamp: ledger.timestamp(),
            })
        })
        .await
    }

    // ── Pipeline ────────────────────────────────────────────────────────

    async fn execute_read<P, R, F>(
        &self,
        request: SignedRequest<P>,
        answer: F,
    ) -> Result<SignedResponse<R>, BankError>
    where
        P: NoncedRequest,
        R: ReplicaPayload,
        F: FnOnce(&Ledger, &P) -> Result<R, LedgerError>,
    {
        let ledger = self.ledger.read().await;
        {
            let mut nonces = self.nonces.lock().await;
            let admitted = self.validator.admit_read(&request, &mut nonces);
            self.metrics.outstanding_nonces.set(nonces.outstanding() as i64);
            if let Err(e) = admitted {
                self.reject::<P>(request.payload.account(), &e);
                return Err(e.into());
            }
        }
        let payload = answer(&*ledger, &request.payload).map_err(|e| {
            self.metrics.record_failure(e.label());
            BankError::from(e)
        })?;
        self.metrics.reads_served.inc();
        Ok(self.sign_response(payload))
    }

    /// Validate and apply a write under the exclusive ledger lock.
    ///
    /// Once validation passes the request's timestamp is adopted and the ledger
    /// is persisted, even if `apply` then refuses the operation.
    async fn execute_write<P, R, F>(
        &self,
        request: SignedRequest<P>,
        kind: WriteKind,
        apply: F,
    ) -> Result<SignedResponse<R>, BankError>
    where
        P: WriteRequest,
        R: ReplicaPayload,
        F: FnOnce(&mut Ledger, &P) -> Result<R, LedgerError>,
    {
        let mut ledger = self.ledger.write().await;
        let started = Instant::now();
        let admitted = {
            let mut nonces = self.nonces.lock().await;
            let mut throttle = match &self.throttle {
                Some(t) => Some(t.lock().await),
                None => None,
            };
            let result = self.validator.admit_write(
                &request,
                kind,
                WriteContext {
                    ledger: &mut *ledger,
                    nonces: &mut *nonces,
                    throttle: throttle.as_deref_mut(),
                    now: started,
                },
            );
            self.metrics.outstanding_nonces.set(nonces.outstanding() as i64);
            result
        };
        if let Err(e) = admitted {
            self.reject::<P>(request.payload.account(), &e);
            return Err(e.into());
        }
        self.metrics.writes_admitted.inc();

        let outcome = apply(&mut *ledger, &request.payload);
        self.persist(&ledger)?;
        self.metrics.account_count.set(ledger.account_count() as i64);
        self.metrics.ledger_timestamp.set(ledger.timestamp().value() as i64);
        self.metrics
            .write_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);

        match outcome {
            Ok(payload) => {
                info!(
                    replica = self.id,
                    op = P::KIND,
                    account = %request.payload.account(),
                    timestamp = %ledger.timestamp(),
                    "write applied"
                );
                if kind == WriteKind::Repair {
                    self.metrics.write_backs_applied.inc();
                }
                Ok(self.sign_response(payload))
            }
            Err(e) => {
                debug!(
                    replica = self.id,
                    op = P::KIND,
                    account = %request.payload.account(),
                    error = %e,
                    "write refused by ledger"
                );
                self.metrics.record_failure(e.label());
                Err(e.into())
            }
        }
    }

    fn persist(&self, ledger: &Ledger) -> Result<(), BankError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save(ledger).map_err(|e| {
            warn!(replica = self.id, error = %e, "failed to persist ledger");
            self.metrics.snapshot_failures.inc();
            BankError::Unavailable(format!("snapshot write failed: {e}"))
        })
    }

    fn reject<P: Payload>(&self, account: &PublicKey, error: &ValidationError) {
        let stage = error.stage();
        debug!(
            replica = self.id,
            op = P::KIND,
            %account,
            stage = stage.as_str(),
            %error,
            "request rejected"
        );
        self.metrics.record_rejection(stage);
    }
}
