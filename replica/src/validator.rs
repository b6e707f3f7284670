//! Request validation pipeline.
//!
//! Every request passes a fixed sequence of stages and is refused at the first
//! one that fails:
//!
//! | stage     | nonce issue | reads | writes | write-backs |
//! |-----------|:-----------:|:-----:|:------:|:-----------:|
//! | signature | x           | x     | x      | x           |
//! | throttle  |             |       | x      |             |
//! | work      |             |       | x      |             |
//! | nonce     |             | x     | x      | x           |
//! | timestamp |             |       | x      | x           |
//!
//! Writes must run the whole pipeline and the ledger mutation it gates under
//! the ledger's exclusive lock; the caller provides the locked state.

use std::time::Instant;

use thiserror::Error;

use bftb_ledger::Ledger;
use bftb_messages::{AccountRequest, NoncedRequest, SignedRequest, WriteRequest};
use bftb_types::{BankError, WriteTimestamp};
use bftb_work::{validate_work, Difficulty, WorkCounter};

use crate::{NonceTable, WriteThrottle};

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Signature,
    Throttle,
    Work,
    Nonce,
    Timestamp,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Signature => "signature",
            Stage::Throttle => "throttle",
            Stage::Work => "work",
            Stage::Nonce => "nonce",
            Stage::Timestamp => "timestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("signature does not verify under the request's key")]
    BadSignature,

    #[error("account exceeded its write allowance")]
    Throttled,

    #[error("missing or insufficient proof of work")]
    BadWork,

    #[error("nonce missing, foreign or already used")]
    BadNonce,

    #[error("write timestamp {submitted} is not after ledger timestamp {current}")]
    StaleTimestamp {
        submitted: WriteTimestamp,
        current: WriteTimestamp,
    },
}

impl ValidationError {
    pub fn stage(&self) -> Stage {
        match self {
            ValidationError::BadSignature => Stage::Signature,
            ValidationError::Throttled => Stage::Throttle,
            ValidationError::BadWork => Stage::Work,
            ValidationError::BadNonce => Stage::Nonce,
            ValidationError::StaleTimestamp { .. } => Stage::Timestamp,
        }
    }
}

impl From<ValidationError> for BankError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::BadSignature => BankError::AuthenticationFailure,
            ValidationError::Throttled => BankError::WorkLimitExceeded,
            ValidationError::BadWork => BankError::SpamRejected,
            ValidationError::BadNonce => BankError::ReplayDetected,
            ValidationError::StaleTimestamp { .. } => BankError::StaleWrite,
        }
    }
}

/// Whether a write is a client operation or a client-driven repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Open, send, receive: full pipeline.
    Operation,
    /// Write-back: no work, no throttle.
    Repair,
}

/// Replica state a write is validated against, all under the exclusive lock.
pub struct WriteContext<'a> {
    pub ledger: &'a mut Ledger,
    pub nonces: &'a mut NonceTable,
    pub throttle: Option<&'a mut WriteThrottle>,
    pub now: Instant,
}

/// Stateless stage logic; state is passed in by the replica.
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator {
    difficulty: Difficulty,
}

impl RequestValidator {
    pub fn new(difficulty: Difficulty) -> Self {
        Self { difficulty }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn check_signature<P: AccountRequest>(
        &self,
        request: &SignedRequest<P>,
    ) -> Result<(), ValidationError> {
        if request.verify() {
            Ok(())
        } else {
            Err(ValidationError::BadSignature)
        }
    }

    pub fn check_throttle<P: AccountRequest>(
        &self,
        request: &SignedRequest<P>,
        throttle: Option<&mut WriteThrottle>,
        now: Instant,
    ) -> Result<(), ValidationError> {
        match throttle {
            Some(t) => {
                if t.try_acquire(request.payload.account(), now) {
                    Ok(())
                } else {
                    Err(ValidationError::Throttled)
                }
            }
            None => Ok(()),
        }
    }

    pub fn check_work<P: AccountRequest>(
        &self,
        request: &SignedRequest<P>,
    ) -> Result<(), ValidationError> {
        let Some(counter) = request.work else {
            return Err(ValidationError::BadWork);
        };
        let payload = request.payload.signing_bytes();
        if validate_work(&payload, WorkCounter(counter), self.difficulty) {
            Ok(())
        } else {
            Err(ValidationError::BadWork)
        }
    }

    /// Consumes the nonce on success.
    pub fn check_nonce<P: NoncedRequest>(
        &self,
        request: &SignedRequest<P>,
        nonces: &mut NonceTable,
    ) -> Result<(), ValidationError> {
        let payload = &request.payload;
        if nonces.consume(payload.account(), payload.nonce()) {
            Ok(())
        } else {
            Err(ValidationError::BadNonce)
        }
    }

    /// Adopts the write timestamp on success.
    pub fn check_timestamp<P: WriteRequest>(
        &self,
        request: &SignedRequest<P>,
        ledger: &mut Ledger,
    ) -> Result<(), ValidationError> {
        let submitted = request.payload.write_timestamp();
        if ledger.advance_timestamp(submitted) {
            Ok(())
        } else {
            Err(ValidationError::StaleTimestamp {
                submitted,
                current: ledger.timestamp(),
            })
        }
    }

    /// Pipeline for nonce issuance: signature only.
    pub fn admit_nonce_request<P: AccountRequest>(
        &self,
        request: &SignedRequest<P>,
    ) -> Result<(), ValidationError> {
        self.check_signature(request)
    }

    /// Pipeline for reads: signature, nonce.
    pub fn admit_read<P: NoncedRequest>(
        &self,
        request: &SignedRequest<P>,
        nonces: &mut NonceTable,
    ) -> Result<(), ValidationError> {
        self.check_signature(request)?;
        self.check_nonce(request, nonces)
    }

    /// Pipeline for writes. On success the nonce is consumed and the ledger
    /// has adopted the request's timestamp.
    pub fn admit_write<P: WriteRequest>(
        &self,
        request: &SignedRequest<P>,
        kind: WriteKind,
        ctx: WriteContext<'_>,
    ) -> Result<(), ValidationError> {
        self.check_signature(request)?;
        if kind == WriteKind::Operation {
            self.check_throttle(request, ctx.throttle, ctx.now)?;
            self.check_work(request)?;
        }
        self.check_nonce(request, ctx.nonces)?;
        self.check_timestamp(request, ctx.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ThrottleConfig;
    use bftb_crypto::generate_keypair;
    use bftb_messages::{CheckAccountRequest, OpenAccountRequest, Payload};
    use bftb_types::{KeyPair, Nonce};
    use bftb_work::WorkGenerator;

    const TEST_BITS: u32 = 6;

    fn validator() -> RequestValidator {
        RequestValidator::new(Difficulty::new(TEST_BITS).unwrap())
    }

    fn open_request(
        kp: &KeyPair,
        nonce: Nonce,
        ts: u64,
        with_work: bool,
    ) -> SignedRequest<OpenAccountRequest> {
        let payload = OpenAccountRequest {
            account: kp.public.clone(),
            timestamp: WriteTimestamp::new(ts),
            nonce,
        };
        let bytes = payload.signing_bytes();
        let request = SignedRequest::sign(payload, &kp.private);
        if with_work {
            let counter = WorkGenerator
                .generate(&bytes, Difficulty::new(TEST_BITS).unwrap())
                .unwrap();
            request.with_work(counter.0)
        } else {
            request
        }
    }

    fn admit(
        request: &SignedRequest<OpenAccountRequest>,
        kind: WriteKind,
        ledger: &mut Ledger,
        nonces: &mut NonceTable,
    ) -> Result<(), ValidationError> {
        validator().admit_write(
            request,
            kind,
            WriteContext {
                ledger,
                nonces,
                throttle: None,
                now: Instant::now(),
            },
        )
    }

    #[test]
    fn valid_write_consumes_nonce_and_adopts_timestamp() {
        let kp = generate_keypair();
        let mut ledger = Ledger::default();
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);

        let request = open_request(&kp, nonce, 1, true);
        admit(&request, WriteKind::Operation, &mut ledger, &mut nonces).unwrap();
        assert_eq!(ledger.timestamp(), WriteTimestamp::new(1));
        assert_eq!(nonces.outstanding(), 0);
    }

    #[test]
    fn replayed_write_is_rejected_at_nonce_stage() {
        let kp = generate_keypair();
        let mut ledger = Ledger::default();
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);
        let request = open_request(&kp, nonce, 1, true);
        admit(&request, WriteKind::Operation, &mut ledger, &mut nonces).unwrap();

        let err = admit(&request, WriteKind::Operation, &mut ledger, &mut nonces).unwrap_err();
        assert_eq!(err, ValidationError::BadNonce);
        assert_eq!(BankError::from(err), BankError::ReplayDetected);
    }

    #[test]
    fn stale_timestamp_is_rejected_after_nonce() {
        let kp = generate_keypair();
        let mut ledger = Ledger::default();
        ledger.advance_timestamp(WriteTimestamp::new(5));
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);

        let request = open_request(&kp, nonce, 5, true);
        let err = admit(&request, WriteKind::Operation, &mut ledger, &mut nonces).unwrap_err();
        assert_eq!(err.stage(), Stage::Timestamp);
        assert_eq!(ledger.timestamp(), WriteTimestamp::new(5));
        // The nonce stage ran first and consumed it.
        assert_eq!(nonces.outstanding(), 0);
    }

    #[test]
    fn missing_work_is_rejected_before_nonce() {
        let kp = generate_keypair();
        let mut ledger = Ledger::default();
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);

        let request = open_request(&kp, nonce, 1, false);
        let err = admit(&request, WriteKind::Operation, &mut ledger, &mut nonces).unwrap_err();
        assert_eq!(err, ValidationError::BadWork);
        assert_eq!(nonces.outstanding(), 1);
    }

    #[test]
    fn repair_writes_skip_work() {
        let kp = generate_keypair();
        let mut ledger = Ledger::default();
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);
        let request = open_request(&kp, nonce, 1, false);
        admit(&request, WriteKind::Repair, &mut ledger, &mut nonces).unwrap();
    }

    #[test]
    fn forged_signature_stops_everything() {
        let kp = generate_keypair();
        let mallory = generate_keypair();
        let mut ledger = Ledger::default();
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);

        let mut request = open_request(&mallory, nonce, 1, true);
        request.payload.account = kp.public.clone();
        let err = admit(&request, WriteKind::Operation, &mut ledger, &mut nonces).unwrap_err();
        assert_eq!(err.stage(), Stage::Signature);
        assert_eq!(nonces.outstanding(), 1);
        assert_eq!(ledger.timestamp(), WriteTimestamp::ZERO);
    }

    #[test]
    fn throttle_rejects_before_work() {
        let kp = generate_keypair();
        let mut ledger = Ledger::default();
        let mut nonces = NonceTable::new();
        let mut throttle = WriteThrottle::new(ThrottleConfig {
            max_writes: 1,
            window_secs: 60,
        });
        let now = Instant::now();

        for (i, expect_ok) in [(1u64, true), (2, false)] {
            let nonce = nonces.issue(&kp.public);
            let request = open_request(&kp, nonce, i, true);
            let result = validator().admit_write(
                &request,
                WriteKind::Operation,
                WriteContext {
                    ledger: &mut ledger,
                    nonces: &mut nonces,
                    throttle: Some(&mut throttle),
                    now,
                },
            );
            assert_eq!(result.is_ok(), expect_ok);
            if !expect_ok {
                assert_eq!(result.unwrap_err(), ValidationError::Throttled);
            }
        }
    }

    #[test]
    fn reads_need_signature_and_nonce_only() {
        let kp = generate_keypair();
        let mut nonces = NonceTable::new();
        let nonce = nonces.issue(&kp.public);
        let request = SignedRequest::sign(
            CheckAccountRequest {
                account: kp.public.clone(),
                nonce,
            },
            &kp.private,
        );
        validator().admit_read(&request, &mut nonces).unwrap();
        assert_eq!(
            validator().admit_read(&request, &mut nonces),
            Err(ValidationError::BadNonce)
        );
    }
}
