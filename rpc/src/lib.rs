//! HTTP/JSON server for one ledger replica.
//!
//! Provides endpoints for:
//! - The replica's server key (key exchange)
//! - Nonce issuance and timestamp queries
//! - Account operations: open, send, check, receive, audit, key lookup
//! - Write-back repair of lagging state
//! - Health and Prometheus metrics
//!
//! Every request and response body is the JSON form of the signed envelopes in
//! `bftb-messages`; signatures cover the payload's canonical bytes, not the JSON.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::{ApiError, ErrorBody, RpcError};
pub use server::{create_router, RpcServer};
