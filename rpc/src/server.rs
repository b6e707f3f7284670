//! Axum-based RPC server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use bftb_protocol::paths;
use bftb_replica::Replica;

use crate::handlers;
use crate::RpcError;

/// Create the full router for `replica`.
pub fn create_router(replica: Arc<Replica>) -> Router {
    Router::new()
        .route(paths::HEALTH, get(handlers::health))
        .route(paths::METRICS, get(handlers::metrics))
        .route(paths::SERVER_KEY, get(handlers::server_key))
        .route(paths::NONCE, post(handlers::nonce))
        .route(paths::TIMESTAMP, post(handlers::timestamp))
        .route(paths::PUBLIC_KEY_BY_ID, post(handlers::public_key_by_id))
        .route(paths::OPEN_ACCOUNT, post(handlers::open_account))
        .route(paths::SEND_AMOUNT, post(handlers::send_amount))
        .route(paths::CHECK_ACCOUNT, post(handlers::check_account))
        .route(paths::RECEIVE_AMOUNT, post(handlers::receive_amount))
        .route(paths::AUDIT, post(handlers::audit))
        .route(
            paths::WRITE_BACK_CHECK_ACCOUNT,
            post(handlers::write_back_check_account),
        )
        .route(paths::WRITE_BACK_AUDIT, post(handlers::write_back_audit))
        .layer(TraceLayer::new_for_http())
        .with_state(replica)
}

/// A bound listener plus the replica it serves.
pub struct RpcServer {
    listener: TcpListener,
    replica: Arc<Replica>,
}

impl RpcServer {
    /// Bind `addr`. Port 0 picks a free port; see [`RpcServer::local_addr`].
    pub async fn bind(addr: &str, replica: Arc<Replica>) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RpcError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener, replica })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RpcError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(replica = self.replica.id(), %addr, "RPC server listening");
        let app = create_router(self.replica);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!(%addr, "RPC server stopped");
        Ok(())
    }
}
