//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bftb_types::BankError;

/// Failures running the server itself.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body of every rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: BankError,
}

/// A replica rejection on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BankError);

impl From<BankError> for ApiError {
    fn from(e: BankError) -> Self {
        Self(e)
    }
}

pub fn status_for(error: &BankError) -> StatusCode {
    match error {
        BankError::AuthenticationFailure
        | BankError::ReplayDetected
        | BankError::SpamRejected
        | BankError::InvalidAmount
        | BankError::SelfTransferRejected => StatusCode::BAD_REQUEST,
        BankError::AccountNotFound | BankError::TransactionNotFound => StatusCode::NOT_FOUND,
        BankError::AccountAlreadyExists | BankError::StaleWrite => StatusCode::CONFLICT,
        BankError::InsufficientBalance => StatusCode::PRECONDITION_FAILED,
        BankError::WorkLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
        BankError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(ErrorBody { error: self.0 })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert_eq!(status_for(&BankError::ReplayDetected), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&BankError::AccountNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&BankError::StaleWrite), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&BankError::InsufficientBalance),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_for(&BankError::WorkLimitExceeded),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&BankError::Unavailable("disk full".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn error_body_json_shape() {
        let json = serde_json::to_string(&ErrorBody {
            error: BankError::InsufficientBalance,
        })
        .unwrap();
        assert_eq!(json, r#"{"error":"InsufficientBalance"}"#);
    }
}
