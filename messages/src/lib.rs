//! Messages exchanged between clients and replicas.
//!
//! Every client request is a payload signed by the account's key; every replica
//! answer is a payload signed by the replica's key and carrying the replica's
//! current ledger timestamp. Signatures always cover [`Payload::signing_bytes`],
//! the kind-tagged bincode encoding of the payload, so any transport encoding
//! can carry the envelope.

pub mod envelope;
pub mod requests;
pub mod responses;

pub use envelope::{
    AccountRequest, NoncedRequest, Payload, ReplicaPayload, SignedRequest, SignedResponse,
    WriteRequest,
};
pub use requests::{
    AuditRequest, CheckAccountRequest, NonceRequest, OpenAccountRequest, PublicKeyByIdRequest,
    ReceiveAmountRequest, SendAmountRequest, TimestampRequest, WriteBackAuditRequest,
    WriteBackCheckAccountRequest,
};
pub use responses::{
    AuditResponse, CheckAccountResponse, NonceResponse, OpenAccountResponse, PublicKeyResponse,
    ReceiveAmountResponse, SendAmountResponse, ServerKeyResponse, TimestampResponse,
    WriteBackResponse,
};
