//! HTTP client for one replica.
//!
//! Wraps `reqwest::Client` with the replica's base URL and implements
//! [`ReplicaApi`] over the JSON endpoints in `bftb_protocol::paths`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use bftb_messages::{
    AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse, NonceRequest,
    NonceResponse, OpenAccountRequest, OpenAccountResponse, PublicKeyByIdRequest,
    PublicKeyResponse, ReceiveAmountRequest, ReceiveAmountResponse, SendAmountRequest,
    SendAmountResponse, ServerKeyResponse, SignedRequest, SignedResponse, TimestampRequest,
    TimestampResponse, WriteBackAuditRequest, WriteBackCheckAccountRequest, WriteBackResponse,
};
use bftb_protocol::{paths, CallError, ReplicaApi};
use bftb_types::{BankError, PublicKey};

use crate::ClientError;

/// Body of a rejected request.
#[derive(Deserialize)]
struct ErrorBody {
    error: BankError,
}

#[derive(Clone)]
pub struct HttpReplica {
    http: reqwest::Client,
    base_url: String,
}

impl HttpReplica {
    /// A client for the replica at `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, CallError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("request failed: {e}")))?;
        decode(response).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, CallError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("request failed: {e}")))?;
        decode(response).await
    }
}

async fn decode<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, CallError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| CallError::Transport(format!("invalid response body: {e}")));
    }
    match response.json::<ErrorBody>().await {
        Ok(body) => Err(CallError::Rejected(body.error)),
        Err(_) => Err(CallError::Transport(format!("replica returned HTTP {status}"))),
    }
}

#[async_trait]
impl ReplicaApi for HttpReplica {
    async fn server_key(&self) -> Result<PublicKey, CallError> {
        let response: ServerKeyResponse = self.get(paths::SERVER_KEY).await?;
        Ok(response.key)
    }

    async fn generate_nonce(
        &self,
        request: SignedRequest<NonceRequest>,
    ) -> Result<SignedResponse<NonceResponse>, CallError> {
        self.post(paths::NONCE, &request).await
    }

    async fn get_timestamp(
        &self,
        request: SignedRequest<TimestampRequest>,
    ) -> Result<SignedResponse<TimestampResponse>, CallError> {
        self.post(paths::TIMESTAMP, &request).await
    }

    async fn public_key_by_id(
        &self,
        request: PublicKeyByIdRequest,
    ) -> Result<SignedResponse<PublicKeyResponse>, CallError> {
        self.post(paths::PUBLIC_KEY_BY_ID, &request).await
    }

    async fn open_account(
        &self,
        request: SignedRequest<OpenAccountRequest>,
    ) -> Result<SignedResponse<OpenAccountResponse>, CallError> {
        self.post(paths::OPEN_ACCOUNT, &request).await
    }

    async fn send_amount(
        &self,
        request: SignedRequest<SendAmountRequest>,
    ) -> Result<SignedResponse<SendAmountResponse>, CallError> {
        self.post(paths::SEND_AMOUNT, &request).await
    }

    async fn check_account(
        &self,
        request: SignedRequest<CheckAccountRequest>,
    ) -> Result<SignedResponse<CheckAccountResponse>, CallError> {
        self.post(paths::CHECK_ACCOUNT, &request).await
    }

    async fn receive_amount(
        &self,
        request: SignedRequest<ReceiveAmountRequest>,
    ) -> Result<SignedResponse<ReceiveAmountResponse>, CallError> {
        self.post(paths::RECEIVE_AMOUNT, &request).await
    }

    async fn audit(
        &self,
        request: SignedRequest<AuditRequest>,
    ) -> Result<SignedResponse<AuditResponse>, CallError> {
        self.post(paths::AUDIT, &request).await
    }

    async fn write_back_check_account(
        &self,
        request: SignedRequest<WriteBackCheckAccountRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError> {
        self.post(paths::WRITE_BACK_CHECK_ACCOUNT, &request).await
    }

    async fn write_back_audit(
        &self,
        request: SignedRequest<WriteBackAuditRequest>,
    ) -> Result<SignedResponse<WriteBackResponse>, CallError> {
        self.post(paths::WRITE_BACK_AUDIT, &request).await
    }
}
