//! Application assembly: state, routes, the notification pump, and serving.
//!
//! The serving layer glues three independent loops together: the watcher's
//! watch loop (producing notifications), the broker's control loop (fanning
//! them out), and one pump task in between. Each session then adds its own
//! reader/writer task pair on top.

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;

use lm_core::Config;
use lm_reload::{Broker, BrokerHandle};
use lm_watcher::{DirectoryWatcher, EditorArtifactFilter, WatcherChannels, WatcherHandle};

use crate::error::ServerError;
use crate::ws;

/// Shared state for the reload routes.
///
/// Cloned per request by axum; everything inside is a cheap handle. The
/// `watcher` handle is the seam through which an embedding directory-browsing
/// layer registers newly visited subtrees.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the broker control loop.
    pub broker: BrokerHandle,

    /// Handle to the watched-directory set.
    pub watcher: WatcherHandle,

    /// Service configuration.
    pub config: Config,
}

/// Builds the reload router: the WebSocket upgrade endpoint and a health
/// route. Embedding layers merge their own routes onto this.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Forwards watcher output to the broker until the watcher shuts down.
///
/// Notifications are broadcast to every active subscriber. Watcher errors
/// are logged and the loop keeps running: a runtime filesystem hiccup is
/// not fatal to the watch loop or to any session.
pub async fn run_pump(mut channels: WatcherChannels, broker: BrokerHandle) {
    loop {
        tokio::select! {
            maybe = channels.notifications.recv() => match maybe {
                Some(notification) => {
                    tracing::debug!(
                        subscribers = broker.subscriber_count(),
                        "broadcasting notification"
                    );
                    broker.broadcast(notification).await;
                }
                None => break,
            },
            maybe = channels.errors.recv() => match maybe {
                Some(error) => {
                    tracing::error!(%error, "watcher error");
                }
                None => break,
            },
        }
    }
    tracing::debug!("watcher channels closed, pump exiting");
}

/// Runs the reload server until ctrl-c or SIGTERM.
///
/// Starts the watcher on `config.root`, the broker, the pump, and the HTTP
/// listener, then serves until a shutdown signal arrives. Watcher startup
/// failure is fatal; everything after startup degrades per session.
pub async fn serve(config: Config) -> Result<(), ServerError> {
    let (watcher, channels) =
        DirectoryWatcher::new(&config.root, &config.watch, EditorArtifactFilter).await?;

    let (broker, broker_handle) = Broker::new();
    tokio::spawn(broker.run());
    tokio::spawn(run_pump(channels, broker_handle.clone()));

    let addr = config.server.bind_addr();
    let state = AppState {
        broker: broker_handle,
        watcher: watcher.handle(),
        config,
    };

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
    tracing::info!(addr = %local_addr, root = %state.config.root, "reload server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("shutting down");
    watcher.shutdown().await?;

    Ok(())
}

/// Resolves when the process receives ctrl-c or (on unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
