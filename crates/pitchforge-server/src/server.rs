//! HTTP server implementation.

use crate::{routes::create_router, state::AppState};
use std::io;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// HTTP server for the pitch API
pub struct Server {
    addr: String,
    state: AppState,
    sweepers: Vec<JoinHandle<()>>,
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(addr: impl Into<String>, state: AppState) -> Self {
        Self {
            addr: addr.into(),
            state,
            sweepers: Vec::new(),
        }
    }

    /// Attach a background task that is aborted when the server stops
    #[must_use]
    pub fn with_background_task(mut self, task: JoinHandle<()>) -> Self {
        self.sweepers.push(task);
        self
    }

    /// Run the server until ctrl-c, SIGTERM, or cancellation of the shared
    /// shutdown token
    ///
    /// # Errors
    /// Returns error if the server fails to bind or encounters a fatal error
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            addr,
            state,
            sweepers,
        } = self;

        let shutdown = state.shutdown.clone();
        let router = create_router(state);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(address = %addr, "Server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        for sweeper in &sweepers {
            sweeper.abort();
        }

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// The address that could not be bound
        addr: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Server error during operation
    #[error("Server error: {0}")]
    Serve(#[from] io::Error),
}

/// Shutdown signal handler
///
/// Resolves on ctrl-c, SIGTERM, or external cancellation, then cancels the
/// shared token so in-flight requests stop scheduling retry attempts.
///
/// # Panics
/// Panics if signal handlers cannot be installed (should not happen on
/// supported platforms)
#[allow(clippy::expect_used)]
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
        () = cancel.cancelled() => {
            info!("Shutdown requested, starting graceful shutdown");
        }
    }

    cancel.cancel();
}
