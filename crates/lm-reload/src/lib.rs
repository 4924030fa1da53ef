//! Notification broker and subscriber session machinery for livemark.
//!
//! This crate fans reload notifications out to any number of concurrently
//! connected preview sessions without shared-state races:
//!
//! - The [`Broker`] is an actor: one control loop exclusively owns the
//!   registry of active subscribers and serially processes register,
//!   unregister, and broadcast commands. No lock guards the registry
//!   because nothing else can touch it.
//! - Each [`Subscriber`] owns a bounded mailbox. The broker delivers with a
//!   non-blocking send; a subscriber whose mailbox is full is evicted so
//!   one slow session can never stall delivery to the rest.
//! - [`run_writer`] is the one task permitted to write to a session's
//!   connection, expressed through the [`ReloadSink`] seam. Feeding all
//!   writes (reload frames and keepalive pings) through a single task
//!   removes the classic two-writers-one-socket crash by construction
//!   rather than by locking discipline.
//!
//! # Architecture
//!
//! ```text
//!                    register / unregister / broadcast
//!  handlers ────────────────────────────────────────────┐
//!                                                       ▼
//!                                         ┌──────────────────────────┐
//!                                         │  Broker control loop     │
//!                                         │  (sole registry owner)   │
//!                                         └─────┬──────────┬─────────┘
//!                                     try_send  │          │  try_send
//!                                               ▼          ▼
//!                                        ┌──────────┐ ┌──────────┐
//!                                        │ mailbox  │ │ mailbox  │   ...
//!                                        └────┬─────┘ └────┬─────┘
//!                                             ▼            ▼
//!                                        writer task  writer task
//!                                        (sole sink   (sole sink
//!                                         owner)       owner)
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod broker;
pub mod error;
pub mod subscriber;

// Re-export broker types
pub use broker::{Broker, BrokerHandle};

// Re-export error types
pub use error::SessionError;

// Re-export subscriber types
pub use subscriber::{ReloadSink, Subscriber, SubscriberId, run_writer};
