//! Subscriber sessions and the single-writer delivery task.
//!
//! A subscriber session is served by exactly two tasks:
//!
//! - a **writer task** ([`run_writer`]), the sole owner of the connection's
//!   write half, which turns mailbox messages into `reload` frames and
//!   emits keepalive pings on a fixed interval;
//! - a **reader task** (owned by the serving layer), which only reads, to
//!   detect disconnects and liveness.
//!
//! The writer task is the *only* code path permitted to touch the write
//! primitive. An earlier design shared the connection between a broadcast
//! path and a ping timer and crashed when both wrote at once; routing every
//! write through one task makes that interleaving unrepresentable.
//!
//! The connection's write half is abstracted as the [`ReloadSink`] trait so
//! the delivery loop is independent of the wire library and directly
//! testable.

use std::future::Future;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{self, MissedTickBehavior};
use uuid::Uuid;

use lm_core::SessionConfig;
use lm_watcher::Notification;

use crate::error::SessionError;

/// Unique identity of a subscriber session.
///
/// A new connection always gets a fresh id; sessions are never resurrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Generates a fresh identity.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered preview session, as the broker sees it.
///
/// Holds the session's identity and the sending half of its bounded
/// mailbox. The broker's registry keeps the *only* long-lived clone of the
/// mailbox sender, so unregistration (dropping the subscriber) closes the
/// mailbox, which is the writer task's signal to stop.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    mailbox: mpsc::Sender<Notification>,
    connected_at: Instant,
}

impl Subscriber {
    /// Creates a subscriber with a bounded mailbox of the given capacity.
    ///
    /// Returns the subscriber (to hand to the broker) and the mailbox
    /// receiver (to hand to the writer task).
    #[must_use]
    pub fn new(mailbox_capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (mailbox, mailbox_rx) = mpsc::channel(mailbox_capacity.max(1));
        (
            Self {
                id: SubscriberId::new(),
                mailbox,
                connected_at: Instant::now(),
            },
            mailbox_rx,
        )
    }

    /// Creates a subscriber sized per the session configuration.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> (Self, mpsc::Receiver<Notification>) {
        Self::new(config.mailbox_capacity)
    }

    /// Returns this subscriber's identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Returns when this subscriber connected.
    #[inline]
    #[must_use]
    pub const fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Attempts a non-blocking delivery into the mailbox.
    pub(crate) fn try_notify(
        &self,
        notification: Notification,
    ) -> Result<(), TrySendError<Notification>> {
        self.mailbox.try_send(notification)
    }
}

/// The write half of a subscriber's connection.
///
/// Implementations wrap whatever the wire library hands out (for livemark,
/// the sink half of a split WebSocket). Exactly one [`run_writer`] task
/// ever holds a given sink; nothing else may write to the connection.
pub trait ReloadSink: Send + 'static {
    /// The connection's write error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Writes one reload frame to the wire.
    fn send(
        &mut self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Writes one protocol-level keepalive ping frame to the wire.
    fn ping(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// The delivery loop for one subscriber session.
///
/// Selects between the mailbox and a keepalive timer:
///
/// - a mailbox message is written to the wire as a reload frame; a write
///   failure ends the task with [`SessionError::Write`];
/// - mailbox closure (unregistration, or broker shutdown) ends the task
///   cleanly;
/// - on each tick of `ping_interval`, a ping frame is written; a failed
///   ping is logged and tolerated, because a genuinely dead peer is caught
///   by the reader's liveness deadline.
///
/// The sink is consumed: once this task exits, nothing can write to the
/// connection again.
pub async fn run_writer<S: ReloadSink>(
    id: SubscriberId,
    mut mailbox: mpsc::Receiver<Notification>,
    mut sink: S,
    config: SessionConfig,
) -> Result<(), SessionError> {
    let ping_interval = config.ping_interval();
    let mut ticker = time::interval_at(time::Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = mailbox.recv() => match maybe {
                Some(notification) => {
                    sink.send(notification).await.map_err(SessionError::write)?;
                    tracing::debug!(subscriber = %id, "reload frame delivered");
                }
                None => {
                    tracing::debug!(subscriber = %id, "mailbox closed, writer exiting");
                    return Ok(());
                }
            },
            _ = ticker.tick() => {
                if let Err(error) = sink.ping().await {
                    tracing::debug!(subscriber = %id, %error, "keepalive ping failed");
                }
            }
        }
    }
}
