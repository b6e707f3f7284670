//! The operations one replica offers.

use async_trait::async_trait;

use bftb_messages::{
    AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse, NonceRequest,
    NonceResponse, OpenAccountRequest, OpenAccountResponse, PublicKeyByIdRequest,
    PublicKeyResponse, ReceiveAmountRequest, ReceiveAmountResponse, SendAmountRequest,
    SendAmountResponse, SignedRequest, SignedResponse, TimestampRequest, TimestampResponse,
    WriteBackAuditRequest, WriteBackCheckAccountRequest, WriteBackResponse,
};
use bftb_types::PublicKey;

use crate::CallError;

/// One replica, however it is reached.
///
/// Every method is a single request/response exchange with no retries.
#[async_trait]
pub trait ReplicaApi: Send + Sync {
    /// The key this replica signs its responses with.
    async fn server_key(&self) -> Result<PublicKey, CallError>;

    async fn generate_nonce(
        &self,
        request: SignedRequest<NonceRequest>,
    ) -> Result<SignedResponse<NonceResponse>, CallError>;

    async fn get_timestamp(
        &self,
        request: SignedRequest<TimestampRequest>,
    ) -> Result<SignedResponse<TimestampResponse>, CallError>;

    async fn public_key_by_id(
        &self,
        request: PublicKeyByIdRequest,
    ) -> Result<SignedResponse<PublicKeyResponse>, CallError>;

    async fn open_account(
        &self,
        request: SignedRequest<OpenAccountRequest>,
    ) -> Result<SignedResponse<OpenAccountResponse>, CallError>;

    async fn send_amount(
        &self,
        request: SignedRequest<SendAmountRequest>,
    ) -> Result<SignedResponse<SendAmountResponse>, CallError>;

    async fn check_account(
        &self,
        request: SignedRequest<CheckAccountRequest>,
    ) -> Result<SignedResponse<CheckAccountResponse>, CallError>;

    async fn receive_amount(
        &self,
        request: SignedRequest<ReceiveAmountRequest>,
    ) -> Result<SignedResponse<ReceiveAmountResponse>, CallError>;

    async fn audit(
        &self,
        request: SignedRequest<AuditRequest>,
    ) -> Result<SignedResponse<AuditResponse>, CallError>;

    async fn write_back_check_account(
        &self,
        request: SignedRequest<WriteBackCheckAccountRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError>;

    async fn write_back_audit(
        &self,
        request: SignedRequest<WriteBackAuditRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError>;
}
