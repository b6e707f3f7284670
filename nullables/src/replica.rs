//! Nullable replica: a real in-process [`Replica`] behind a switch that makes
//! it misbehave on demand.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use bftb_crypto::keypair_from_seed;
use bftb_messages::{
    AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse, NonceRequest,
    NonceResponse, OpenAccountRequest, OpenAccountResponse, PublicKeyByIdRequest,
    PublicKeyResponse, ReceiveAmountRequest, ReceiveAmountResponse, ReplicaPayload,
    SendAmountRequest, SendAmountResponse, SignedRequest, SignedResponse, TimestampRequest,
    TimestampResponse, WriteBackAuditRequest, WriteBackCheckAccountRequest, WriteBackResponse,
};
use bftb_protocol::{CallError, ReplicaApi};
use bftb_replica::Replica;
use bftb_types::{BankError, KeyPair, PublicKey};

/// Amount a corrupting replica adds to every balance it reports.
pub const CORRUPT_BALANCE_OFFSET: i64 = 1_000;

/// How a [`NullReplica`] treats the calls it receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Behavior {
    /// Forward everything to the real replica.
    #[default]
    Honest,
    /// Fail every call with a transport error.
    Unreachable,
    /// Answer correctly but sign with a key that is not the replica's.
    ForgeResponses,
    /// Sign false read results with the replica's real key.
    CorruptReads,
    /// Fail every write, write-backs included, with a transport error. Reads pass.
    DropWrites,
    /// Sleep before forwarding each call.
    Delay(Duration),
}

pub struct NullReplica {
    inner: Arc<Replica>,
    forger: KeyPair,
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl NullReplica {
    pub fn new(inner: Arc<Replica>) -> Self {
        Self {
            inner,
            forger: keypair_from_seed(&[0xEE; 32]),
            behavior: Mutex::new(Behavior::Honest),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_behavior(self, behavior: Behavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    pub fn behavior(&self) -> Behavior {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The wrapped replica, for inspecting its ledger directly.
    pub fn replica(&self) -> &Arc<Replica> {
        &self.inner
    }

    /// Calls received so far, including the ones that were made to fail.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Count the call, apply any delay, and fail it if the replica is down.
    async fn gate(&self) -> Result<Behavior, CallError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.behavior() {
            Behavior::Unreachable => Err(CallError::Transport("replica unreachable".into())),
            Behavior::Delay(pause) => {
                tokio::time::sleep(pause).await;
                Ok(Behavior::Delay(pause))
            }
            behavior => Ok(behavior),
        }
    }

    async fn gate_write(&self) -> Result<Behavior, CallError> {
        match self.gate().await? {
            Behavior::DropWrites => Err(CallError::Transport("write dropped".into())),
            behavior => Ok(behavior),
        }
    }

    /// Re-sign with the forger key when forging.
    fn seal<R: ReplicaPayload>(
        &self,
        behavior: Behavior,
        response: Result<SignedResponse<R>, BankError>,
    ) -> Result<SignedResponse<R>, CallError> {
        let response = response?;
        Ok(match behavior {
            Behavior::ForgeResponses => SignedResponse::sign(response.payload, &self.forger.private),
            _ => response,
        })
    }

    /// Apply `lie` to the payload when corrupting reads, signing with the real key.
    fn corrupt<R: ReplicaPayload>(
        &self,
        behavior: Behavior,
        response: Result<SignedResponse<R>, BankError>,
        lie: impl FnOnce(&mut R),
    ) -> Result<SignedResponse<R>, CallError> {
        match behavior {
            Behavior::CorruptReads => {
                let mut payload = response?.payload;
                lie(&mut payload);
                Ok(self.inner.sign_response(payload))
            }
            other => self.seal(other, response),
        }
    }
}

#[async_trait]
impl ReplicaApi for NullReplica {
    async fn server_key(&self) -> Result<PublicKey, CallError> {
        self.gate().await?;
        Ok(self.inner.server_key().clone())
    }

    async fn generate_nonce(
        &self,
        request: SignedRequest<NonceRequest>,
    ) -> Result<SignedResponse<NonceResponse>, CallError> {
        let behavior = self.gate().await?;
        self.seal(behavior, self.inner.generate_nonce(request).await)
    }

    async fn get_timestamp(
        &self,
        request: SignedRequest<TimestampRequest>,
    ) -> Result<SignedResponse<TimestampResponse>, CallError> {
        let behavior = self.gate().await?;
        self.seal(behavior, self.inner.get_timestamp(request).await)
    }

    async fn public_key_by_id(
        &self,
        request: PublicKeyByIdRequest,
    ) -> Result<SignedResponse<PublicKeyResponse>, CallError> {
        let behavior = self.gate().await?;
        let response = self.inner.public_key_by_id(request).await;
        let forged_key = self.forger.public.clone();
        self.corrupt(behavior, response, |p| p.key = forged_key)
    }

    async fn open_account(
        &self,
        request: SignedRequest<OpenAccountRequest>,
    ) -> Result<SignedResponse<OpenAccountResponse>, CallError> {
        let behavior = self.gate_write().await?;
        self.seal(behavior, self.inner.open_account(request).await)
    }

    async fn send_amount(
        &self,
        request: SignedRequest<SendAmountRequest>,
    ) -> Result<SignedResponse<SendAmountResponse>, CallError> {
        let behavior = self.gate_write().await?;
        self.seal(behavior, self.inner.send_amount(request).await)
    }

    async fn check_account(
        &self,
        request: SignedRequest<CheckAccountRequest>,
    ) -> Result<SignedResponse<CheckAccountResponse>, CallError> {
        let behavior = self.gate().await?;
        let response = self.inner.check_account(request).await;
        self.corrupt(behavior, response, |p| p.balance += CORRUPT_BALANCE_OFFSET)
    }

    async fn receive_amount(
        &self,
        request: SignedRequest<ReceiveAmountRequest>,
    ) -> Result<SignedResponse<ReceiveAmountResponse>, CallError> {
        let behavior = self.gate_write().await?;
        self.seal(behavior, self.inner.receive_amount(request).await)
    }

    async fn audit(
        &self,
        request: SignedRequest<AuditRequest>,
    ) -> Result<SignedResponse<AuditResponse>, CallError> {
        let behavior = self.gate().await?;
        let response = self.inner.audit(request).await;
        self.corrupt(behavior, response, |p| {
            p.history.clear();
            p.balance += CORRUPT_BALANCE_OFFSET;
        })
    }

    async fn write_back_check_account(
        &self,
        request: SignedRequest<WriteBackCheckAccountRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError> {
        let behavior = self.gate_write().await?;
        self.seal(behavior, self.inner.write_back_check_account(request).await)
    }

    async fn write_back_audit(
        &self,
        request: SignedRequest<WriteBackAuditRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError> {
        let behavior = self.gate_write().await?;
        self.seal(behavior, self.inner.write_back_audit(request).await)
    }
}
