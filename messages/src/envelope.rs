//! Payload traits and the signed request/response envelopes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use bftb_crypto::{sign_message, verify_signature};
use bftb_types::{Nonce, PrivateKey, PublicKey, Signature, WriteTimestamp};

/// Anything that gets signed.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Distinguishes payloads of identical shape, so a signature for one
    /// operation can never be presented as another.
    const KIND: &'static str;

    /// The exact bytes that are signed and that proof-of-work is computed over.
    fn signing_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(Self::KIND, self)).expect("payload serialization should not fail")
    }
}

/// A payload signed by the account it names.
pub trait AccountRequest: Payload {
    fn account(&self) -> &PublicKey;
}

/// A request that consumes a replica-issued nonce.
pub trait NoncedRequest: AccountRequest {
    fn nonce(&self) -> Nonce;
}

/// A request that must advance the replica's ledger timestamp.
pub trait WriteRequest: NoncedRequest {
    fn write_timestamp(&self) -> WriteTimestamp;
}

/// A replica answer, tagged with the replica's ledger timestamp.
pub trait ReplicaPayload: Payload {
    fn timestamp(&self) -> WriteTimestamp;
}

/// A client request: payload, the account's signature, and optional work.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedRequest<P> {
    pub payload: P,
    pub signature: Signature,
    /// Proof-of-work counter over `payload.signing_bytes()`. Writes only.
    pub work: Option<u64>,
}

impl<P: AccountRequest> SignedRequest<P> {
    pub fn sign(payload: P, private_key: &PrivateKey) -> Self {
        let signature = sign_message(&payload.signing_bytes(), private_key);
        Self {
            payload,
            signature,
            work: None,
        }
    }

    pub fn with_work(mut self, counter: u64) -> Self {
        self.work = Some(counter);
        self
    }

    /// Self-certifying check: the signature must verify under the key the
    /// payload itself names.
    pub fn verify(&self) -> bool {
        verify_signature(
            &self.payload.signing_bytes(),
            &self.signature,
            self.payload.account(),
        )
    }
}

/// A replica answer signed with the replica's key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedResponse<P> {
    pub payload: P,
    pub signature: Signature,
}

impl<P: ReplicaPayload> SignedResponse<P> {
    pub fn sign(payload: P, replica_key: &PrivateKey) -> Self {
        let signature = sign_message(&payload.signing_bytes(), replica_key);
        Self { payload, signature }
    }

    pub fn verify(&self, replica: &PublicKey) -> bool {
        verify_signature(&self.payload.signing_bytes(), &self.signature, replica)
    }

    /// The payload, if signed by `replica`.
    pub fn into_verified(self, replica: &PublicKey) -> Option<P> {
        self.verify(replica).then_some(self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuditRequest, CheckAccountRequest, CheckAccountResponse};
    use bftb_crypto::generate_keypair;

    #[test]
    fn request_verifies_under_embedded_key() {
        let kp = generate_keypair();
        let req = SignedRequest::sign(
            CheckAccountRequest {
                account: kp.public.clone(),
                nonce: Nonce(7),
            },
            &kp.private,
        );
        assert!(req.verify());
    }

    #[test]
    fn request_signed_by_someone_else_fails() {
        let victim = generate_keypair();
        let mallory = generate_keypair();
        let req = SignedRequest::sign(
            CheckAccountRequest {
                account: victim.public.clone(),
                nonce: Nonce(7),
            },
            &mallory.private,
        );
        assert!(!req.verify());
    }

    #[test]
    fn tampered_request_fails() {
        let kp = generate_keypair();
        let mut req = SignedRequest::sign(
            CheckAccountRequest {
                account: kp.public.clone(),
                nonce: Nonce(7),
            },
            &kp.private,
        );
        req.payload.nonce = Nonce(8);
        assert!(!req.verify());
    }

    #[test]
    fn same_shape_different_kind_signs_differently() {
        let kp = generate_keypair();
        let check = CheckAccountRequest {
            account: kp.public.clone(),
            nonce: Nonce(1),
        };
        let audit = AuditRequest {
            account: kp.public.clone(),
            nonce: Nonce(1),
        };
        assert_ne!(check.signing_bytes(), audit.signing_bytes());
    }

    #[test]
    fn response_verifies_only_under_replica_key() {
        let replica = generate_keypair();
        let other = generate_keypair();
        let resp = SignedResponse::sign(
            CheckAccountResponse {
                balance: 50,
                pending_credits: vec![],
                timestamp: WriteTimestamp::new(4),
            },
            &replica.private,
        );
        assert!(resp.verify(&replica.public));
        assert!(resp.clone().into_verified(&other.public).is_none());
        assert_eq!(resp.into_verified(&replica.public).unwrap().balance, 50);
    }

    #[test]
    fn envelope_survives_json() {
        let kp = generate_keypair();
        let req = SignedRequest::sign(
            CheckAccountRequest {
                account: kp.public.clone(),
                nonce: Nonce(99),
            },
            &kp.private,
        )
        .with_work(12);
        let json = serde_json::to_string(&req).unwrap();
        let back: SignedRequest<CheckAccountRequest> = serde_json::from_str(&json).unwrap();
        assert!(back.verify());
        assert_eq!(back.work, Some(12));
    }
}
