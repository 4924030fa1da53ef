//! The notification broker: a single-owner registry with fan-out.
//!
//! The broker is an actor. Register, unregister, and broadcast requests
//! arrive as commands on one channel and are processed serially by
//! [`Broker::run`], so the registry of active subscribers is mutated by
//! exactly one logical thread. Concurrent register/broadcast races cannot
//! corrupt the set because nothing else can reach it.
//!
//! Delivery is non-blocking: a broadcast attempts a `try_send` into each
//! subscriber mailbox and evicts subscribers whose mailbox is full. The
//! control loop therefore never blocks on any single subscriber.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use lm_core::FxHashMap;
use lm_watcher::Notification;

use crate::subscriber::{Subscriber, SubscriberId};

/// Capacity of the broker command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// A command for the broker control loop.
#[derive(Debug)]
enum BrokerCommand {
    /// Add a subscriber to the active set.
    Register(Subscriber),
    /// Remove a subscriber and close its mailbox.
    Unregister(SubscriberId),
    /// Deliver a notification to every active subscriber.
    Broadcast(Notification),
}

/// The broker control loop and the registry it exclusively owns.
///
/// Create with [`Broker::new`], then drive with [`Broker::run`] (typically
/// `tokio::spawn(broker.run())`). The loop exits once every
/// [`BrokerHandle`] is dropped; dropping the registry then closes every
/// subscriber mailbox, which stops their writer tasks.
#[derive(Debug)]
pub struct Broker {
    commands: mpsc::Receiver<BrokerCommand>,
    registry: FxHashMap<SubscriberId, Subscriber>,
    active: Arc<AtomicUsize>,
}

/// A cheap, cloneable handle for talking to the broker.
///
/// Handles only send commands; they never touch the registry.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    commands: mpsc::Sender<BrokerCommand>,
    active: Arc<AtomicUsize>,
}

impl Broker {
    /// Creates the broker and its first handle.
    #[must_use]
    pub fn new() -> (Self, BrokerHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let active = Arc::new(AtomicUsize::new(0));

        (
            Self {
                commands: command_rx,
                registry: FxHashMap::default(),
                active: Arc::clone(&active),
            },
            BrokerHandle {
                commands: command_tx,
                active,
            },
        )
    }

    /// Runs the control loop until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                BrokerCommand::Register(subscriber) => self.register(subscriber),
                BrokerCommand::Unregister(id) => self.unregister(id),
                BrokerCommand::Broadcast(notification) => self.broadcast(notification),
            }
        }
        tracing::debug!("all broker handles dropped, control loop exiting");
    }

    fn register(&mut self, subscriber: Subscriber) {
        let id = subscriber.id();
        if self.registry.contains_key(&id) {
            tracing::debug!(subscriber = %id, "subscriber already registered");
            return;
        }

        self.registry.insert(id, subscriber);
        self.publish_count();
        tracing::debug!(
            subscriber = %id,
            active = self.registry.len(),
            "subscriber registered"
        );
    }

    fn unregister(&mut self, id: SubscriberId) {
        // Dropping the subscriber drops the registry's mailbox sender; the
        // closed mailbox is the writer task's signal to stop.
        if self.registry.remove(&id).is_some() {
            self.publish_count();
            tracing::debug!(
                subscriber = %id,
                active = self.registry.len(),
                "subscriber unregistered"
            );
        }
    }

    fn broadcast(&mut self, notification: Notification) {
        let mut evicted = Vec::new();

        for (id, subscriber) in &self.registry {
            match subscriber.try_notify(notification) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = %id, "mailbox full, evicting slow subscriber");
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, "mailbox closed, dropping subscriber");
                    evicted.push(*id);
                }
            }
        }

        for id in evicted {
            self.unregister(id);
        }
    }

    fn publish_count(&self) {
        self.active.store(self.registry.len(), Ordering::Relaxed);
    }
}

impl BrokerHandle {
    /// Adds `subscriber` to the active set; a no-op if already present.
    pub async fn register(&self, subscriber: Subscriber) {
        self.send(BrokerCommand::Register(subscriber)).await;
    }

    /// Removes a subscriber and closes its mailbox.
    ///
    /// Idempotent: unknown ids and repeated calls are no-ops.
    pub async fn unregister(&self, id: SubscriberId) {
        self.send(BrokerCommand::Unregister(id)).await;
    }

    /// Delivers `notification` to every currently active subscriber.
    ///
    /// Subscribers whose mailbox cannot absorb the message are evicted;
    /// everyone else still receives it.
    pub async fn broadcast(&self, notification: Notification) {
        self.send(BrokerCommand::Broadcast(notification)).await;
    }

    /// Returns the number of active subscribers, as of the last command the
    /// control loop finished processing.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    async fn send(&self, command: BrokerCommand) {
        // The loop outlives every handle, so this only fails during
        // shutdown, when the command no longer matters.
        if self.commands.send(command).await.is_err() {
            tracing::debug!("broker control loop gone, command dropped");
        }
    }
}
