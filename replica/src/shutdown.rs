//! Graceful shutdown for a running replica.
//!
//! The controller holds a `watch` flag rather than a one-shot message, so a
//! task that starts waiting after shutdown was triggered still sees it.

use std::fmt;

use tokio::signal;
use tokio::sync::watch;

/// Why the replica is stopping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownReason::Interrupt => "SIGINT",
            ShutdownReason::Terminate => "SIGTERM",
            ShutdownReason::Requested => "requested",
        })
    }
}

/// Shared stop flag for the HTTP server and background tasks of one replica.
pub struct ShutdownController {
    tx: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Stop with `reason`. Only the first trigger is recorded.
    pub fn trigger(&self, reason: ShutdownReason) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    pub fn shutdown(&self) {
        self.trigger(ShutdownReason::Requested);
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been triggered, including before this call.
    ///
    /// Suitable for `axum::serve(..).with_graceful_shutdown(..)`.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            let _ = rx.wait_for(Option::is_some).await;
        }
    }

    /// Wait for SIGINT, SIGTERM or a programmatic trigger, and return the reason.
    pub async fn wait_for_signal(&self) -> ShutdownReason {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => self.trigger(ShutdownReason::Interrupt),
            _ = terminate => self.trigger(ShutdownReason::Terminate),
            _ = self.signalled() => {}
        }

        let reason = self.reason().unwrap_or(ShutdownReason::Requested);
        tracing::info!(%reason, "shutting down");
        reason
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
