//! WebSocket upgrade handling and per-session task wiring.
//!
//! Each accepted upgrade creates a brand-new subscriber and exactly two
//! tasks:
//!
//! - the **writer task** (spawned here, running
//!   [`lm_reload::run_writer`]) takes the socket's write half and is the
//!   only code that ever writes to it; reload frames and keepalive pings
//!   both flow through it;
//! - the **reader loop** (this handler's own body) only reads. Every
//!   successful read, pong frames included, resets the liveness deadline;
//!   a read error, a close frame, or a silent peer past the deadline tears
//!   the session down.
//!
//! Teardown is convergent and idempotent: whichever side ends first, the
//! session unregisters (safe to repeat, since the broker may already have
//! evicted it), the mailbox closes, the writer exits, and the connection
//! drops. Failures here never leave the session.

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;

use lm_core::SessionConfig;
use lm_reload::{ReloadSink, SessionError, Subscriber, SubscriberId, run_writer};
use lm_watcher::Notification;

use crate::app::AppState;

/// `GET /ws`: upgrades the connection and runs the session to completion.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// The write half of an upgraded WebSocket, as seen by the writer task.
struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

impl ReloadSink for WsSink {
    type Error = axum::Error;

    async fn send(&mut self, notification: Notification) -> Result<(), Self::Error> {
        self.sender
            .send(Message::Text(notification.payload().into()))
            .await
    }

    async fn ping(&mut self) -> Result<(), Self::Error> {
        self.sender.send(Message::Ping(Bytes::new())).await
    }
}

/// How a session came to its end.
enum SessionEnd {
    /// The reader stopped: peer disconnect, read error, or liveness expiry.
    Reader(Option<SessionError>),
    /// The writer stopped: write error, or the mailbox was closed under it
    /// (eviction or broker shutdown).
    Writer,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_config = state.config.session;
    let (ws_sender, mut ws_receiver) = socket.split();

    let (subscriber, mailbox_rx) = Subscriber::from_config(&session_config);
    let id = subscriber.id();
    state.broker.register(subscriber).await;
    tracing::info!(subscriber = %id, "preview session connected");

    let mut writer = tokio::spawn(run_writer(
        id,
        mailbox_rx,
        WsSink { sender: ws_sender },
        session_config,
    ));

    let end = tokio::select! {
        reason = read_session(&mut ws_receiver, id, session_config) => SessionEnd::Reader(reason),
        writer_result = &mut writer => {
            match writer_result {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    tracing::debug!(subscriber = %id, %error, "writer ended with error");
                }
                Err(join_error) => {
                    tracing::error!(subscriber = %id, %join_error, "writer task failed");
                }
            }
            SessionEnd::Writer
        }
    };

    // Idempotent: the broker may already have evicted this subscriber
    state.broker.unregister(id).await;

    match end {
        SessionEnd::Reader(reason) => {
            if let Some(error) = reason {
                tracing::debug!(subscriber = %id, %error, "session read path ended");
            }
            // Unregistration closed the mailbox; give the writer a moment
            // to drain and exit before the connection drops
            if timeout(std::time::Duration::from_secs(1), &mut writer)
                .await
                .is_err()
            {
                writer.abort();
            }
        }
        SessionEnd::Writer => {}
    }

    tracing::info!(subscriber = %id, "preview session closed");
}

/// The sole reading path of a session.
///
/// Returns when the session should end: `None` for an orderly close,
/// `Some(error)` for a read failure or liveness expiry.
async fn read_session(
    receiver: &mut SplitStream<WebSocket>,
    id: SubscriberId,
    config: SessionConfig,
) -> Option<SessionError> {
    let window = config.liveness_window();

    loop {
        match timeout(window, receiver.next()).await {
            // Nothing read within the liveness window: the peer is presumed dead
            Err(_) => return Some(SessionError::LivenessExpired),
            Ok(None) => return None,
            Ok(Some(Err(error))) => return Some(SessionError::read(error)),
            Ok(Some(Ok(Message::Close(_)))) => {
                tracing::debug!(subscriber = %id, "peer sent close frame");
                return None;
            }
            Ok(Some(Ok(message))) => {
                // Any frame counts as liveness; pongs are the usual case
                tracing::trace!(subscriber = %id, ?message, "read activity");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{AppState, router, run_pump};
    use camino::Utf8Path;
    use lm_core::Config;
    use lm_reload::Broker;
    use lm_watcher::{DirectoryWatcher, EditorArtifactFilter};
    use std::fs;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_tungstenite::connect_async;

    /// Boots a full watcher + broker + pump + server stack on an ephemeral
    /// port and returns what the tests need to drive it.
    ///
    /// The returned watcher must stay alive for the duration of the test.
    async fn start_stack(temp_dir: &TempDir) -> (SocketAddr, AppState, DirectoryWatcher) {
        let root = Utf8Path::from_path(temp_dir.path())
            .expect("Invalid path")
            .to_owned();

        let mut config = Config::default();
        config.root.clone_from(&root);

        let (watcher, channels) =
            DirectoryWatcher::new(&root, &config.watch, EditorArtifactFilter)
                .await
                .expect("Failed to create watcher");

        let (broker, broker_handle) = Broker::new();
        tokio::spawn(broker.run());
        tokio::spawn(run_pump(channels, broker_handle.clone()));

        let state = AppState {
            broker: broker_handle,
            watcher: watcher.handle(),
            config,
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local addr");

        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        (addr, state, watcher)
    }

    async fn wait_for_subscribers(state: &AppState, expected: usize) {
        for _ in 0..100 {
            if state.broker.subscriber_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "subscriber count never reached {expected}, still {}",
            state.broker.subscriber_count()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_change_pushes_reload_frame() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (addr, state, _watcher) = start_stack(&temp_dir).await;

        let (mut ws, _response) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        wait_for_subscribers(&state, 1).await;

        fs::write(temp_dir.path().join("page.md"), "# hello").expect("Failed to write file");

        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected a frame within 2s")
            .expect("Stream ended early")
            .expect("Read failed");
        assert_eq!(frame.into_text().expect("Expected a text frame"), "reload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_directory_added_at_runtime_is_watched() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (addr, state, _watcher) = start_stack(&temp_dir).await;

        let (mut ws, _response) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        wait_for_subscribers(&state, 1).await;

        // A subtree created after startup, registered the way the
        // directory-browsing layer would on navigation
        let sub = temp_dir.path().join("notes");
        fs::create_dir(&sub).expect("Failed to create subdir");
        let sub_path = Utf8Path::from_path(&sub).expect("Invalid path");
        state
            .watcher
            .add_directory(sub_path)
            .expect("Failed to add directory");

        // Creating the subdir itself may have produced a reload; drain any
        // such frame and let the cooldown lapse before the real write
        while let Ok(Some(Ok(_))) =
            tokio::time::timeout(Duration::from_millis(300), ws.next()).await
        {}

        fs::write(sub.join("inner.md"), "# inner").expect("Failed to write file");

        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Expected a frame within 2s")
            .expect("Stream ended early")
            .expect("Read failed");
        assert_eq!(frame.into_text().expect("Expected a text frame"), "reload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_disconnect_unregisters_subscriber() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (addr, state, _watcher) = start_stack(&temp_dir).await;

        let (ws, _response) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        wait_for_subscribers(&state, 1).await;

        drop(ws);
        wait_for_subscribers(&state, 0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_sessions_both_receive() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let (addr, state, _watcher) = start_stack(&temp_dir).await;

        let (mut ws_a, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        let (mut ws_b, _) = connect_async(format!("ws://{addr}/ws"))
            .await
            .expect("Failed to connect");
        wait_for_subscribers(&state, 2).await;

        fs::write(temp_dir.path().join("shared.md"), "# both").expect("Failed to write file");

        for ws in [&mut ws_a, &mut ws_b] {
            let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("Expected a frame within 2s")
                .expect("Stream ended early")
                .expect("Read failed");
            assert_eq!(frame.into_text().expect("Expected a text frame"), "reload");
        }
    }
}
