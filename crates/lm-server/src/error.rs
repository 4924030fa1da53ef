//! Error types for the lm-server crate.

use std::net::SocketAddr;

use lm_watcher::WatchError;

/// Errors that can occur while starting or running the reload server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that failed to bind.
        addr: SocketAddr,
        /// The underlying bind failure.
        #[source]
        source: std::io::Error,
    },

    /// The watcher could not be started or shut down.
    ///
    /// At startup this is fatal to the whole live-reload feature; runtime
    /// watcher errors never take this path (they are logged by the pump).
    #[error(transparent)]
    Watcher(#[from] WatchError),

    /// The HTTP server failed while serving.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
