//! RPC request handlers. Each one unwraps the JSON envelope, calls the replica,
//! and returns its signed response or a rejection.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use bftb_messages::{
    AuditRequest, AuditResponse, CheckAccountRequest, CheckAccountResponse, NonceRequest,
    NonceResponse, OpenAccountRequest, OpenAccountResponse, PublicKeyByIdRequest,
    PublicKeyResponse, ReceiveAmountRequest, ReceiveAmountResponse, SendAmountRequest,
    SendAmountResponse, ServerKeyResponse, SignedRequest, SignedResponse, TimestampRequest,
    TimestampResponse, WriteBackAuditRequest, WriteBackCheckAccountRequest, WriteBackResponse,
};
use bftb_protocol::PROTOCOL_VERSION;
use bftb_replica::Replica;

use crate::ApiError;

type Reply<P> = Result<Json<SignedResponse<P>>, ApiError>;

// ── Unordered ────────────────────────────────────────────────────────────

pub async fn server_key(State(replica): State<Arc<Replica>>) -> Json<ServerKeyResponse> {
    Json(ServerKeyResponse {
        key: replica.server_key().clone(),
    })
}

pub async fn nonce(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<NonceRequest>>,
) -> Reply<NonceResponse> {
    Ok(Json(replica.generate_nonce(request).await?))
}

pub async fn timestamp(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<TimestampRequest>>,
) -> Reply<TimestampResponse> {
    Ok(Json(replica.get_timestamp(request).await?))
}

pub async fn public_key_by_id(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<PublicKeyByIdRequest>,
) -> Reply<PublicKeyResponse> {
    Ok(Json(replica.public_key_by_id(request).await?))
}

// ── Account operations ───────────────────────────────────────────────────

pub async fn open_account(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<OpenAccountRequest>>,
) -> Reply<OpenAccountResponse> {
    Ok(Json(replica.open_account(request).await?))
}

pub async fn send_amount(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<SendAmountRequest>>,
) -> Reply<SendAmountResponse> {
    Ok(Json(replica.send_amount(request).await?))
}

pub async fn check_account(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<CheckAccountRequest>>,
) -> Reply<CheckAccountResponse> {
    Ok(Json(replica.check_account(request).await?))
}

pub async fn receive_amount(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<ReceiveAmountRequest>>,
) -> Reply<ReceiveAmountResponse> {
    Ok(Json(replica.receive_amount(request).await?))
}

pub async fn audit(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<AuditRequest>>,
) -> Reply<AuditResponse> {
    Ok(Json(replica.audit(request).await?))
}

// ── Write-back ───────────────────────────────────────────────────────────

pub async fn write_back_check_account(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<WriteBackCheckAccountRequest>>,
) -> Reply<WriteBackResponse> {
    Ok(Json(replica.write_back_check_account(request).await?))
}

pub async fn write_back_audit(
    State(replica): State<Arc<Replica>>,
    Json(request): Json<SignedRequest<WriteBackAuditRequest>>,
) -> Reply<WriteBackResponse> {
    Ok(Json(replica.write_back_audit(request).await?))
}

// ── Telemetry ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub replica_id: usize,
    pub protocol_version: u16,
    pub ledger_timestamp: u64,
}

pub async fn health(State(replica): State<Arc<Replica>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        replica_id: replica.id(),
        protocol_version: PROTOCOL_VERSION,
        ledger_timestamp: replica.ledger_timestamp().await.value(),
    })
}

pub async fn metrics(State(replica): State<Arc<Replica>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        replica.metrics().encode(),
    )
}
