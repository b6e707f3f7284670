//! In-process binding of [`ReplicaApi`]: a client can talk to a [`Replica`]
//! directly, with no transport in between.

use async_trait::async_trait;

use bftb_messages::{
    AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse, NonceRequest,
    NonceResponse, OpenAccountRequest, OpenAccountResponse, PublicKeyByIdRequest,
    PublicKeyResponse, ReceiveAmountRequest, ReceiveAmountResponse, SendAmountRequest,
    SendAmountResponse, SignedRequest, SignedResponse, TimestampRequest, TimestampResponse,
    WriteBackAuditRequest, WriteBackCheckAccountRequest, WriteBackResponse,
};
use bftb_protocol::{CallError, ReplicaApi};
use bftb_types::PublicKey;

use crate::Replica;

#[async_trait]
impl ReplicaApi for Replica {
    async fn server_key(&self) -> Result<PublicKey, CallError> {
        Ok(Replica::server_key(self).clone())
    }

    async fn generate_nonce(
        &self,
        request: SignedRequest<NonceRequest>,
    ) -> Result<SignedResponse<NonceResponse>, CallError> {
        Ok(Replica::generate_nonce(self, request).await?)
    }

    async fn get_timestamp(
        &self,
        request: SignedRequest<TimestampRequest>,
    ) -> Result<SignedResponse<TimestampResponse>, CallError> {
        Ok(Replica::get_timestamp(self, request).await?)
    }

    async fn public_key_by_id(
        &self,
        request: PublicKeyByIdRequest,
    ) -> Result<SignedResponse<PublicKeyResponse>, CallError> {
        Ok(Replica::public_key_by_id(self, request).await?)
    }

    async fn open_account(
        &self,
        request: SignedRequest<OpenAccountRequest>,
    ) -> Result<SignedResponse<OpenAccountResponse>, CallError> {
        Ok(Replica::open_account(self, request).await?)
    }

    async fn send_amount(
        &self,
        request: SignedRequest<SendAmountRequest>,
    ) -> Result<SignedResponse<SendAmountResponse>, CallError> {
        Ok(Replica::send_amount(self, request).await?)
    }

    async fn check_account(
        &self,
        request: SignedRequest<CheckAccountRequest>,
    ) -> Result<SignedResponse<CheckAccountResponse>, CallError> {
        Ok(Replica::check_account(self, request).await?)
    }

    async fn receive_amount(
        &self,
        request: SignedRequest<ReceiveAmountRequest>,
    ) -> Result<SignedResponse<ReceiveAmountResponse>, CallError> {
        Ok(Replica::receive_amount(self, request).await?)
    }

    async fn audit(
        &self,
        request: SignedRequest<AuditRequest>,
    ) -> Result<SignedResponse<AuditResponse>, CallError> {
        Ok(Replica::audit(self, request).await?)
    }

    async fn write_back_check_account(
        &self,
        request: SignedRequest<WriteBackCheckAccountRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError> {
        Ok(Replica::write_back_check_account(self, request).await?)
    }

    async fn write_back_audit(
        &self,
        request: SignedRequest<WriteBackAuditRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError> {
        Ok(Replica::write_back_audit(self, request).await?)
    }
}
