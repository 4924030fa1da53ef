//! WebSocket reload server wiring the watcher and broker together.
//!
//! This crate is the serving layer of livemark. It owns the three pieces of
//! runtime wiring the fan-out subsystem needs:
//!
//! - the **router** (`GET /ws` upgrade endpoint plus a health route), which
//!   is also the seam an embedding HTTP layer merges its own routes into;
//! - the **pump**, one task forwarding watcher notifications to the broker
//!   and logging watcher errors (which are never fatal at runtime);
//! - the **session wiring**: on each upgrade, a fresh subscriber is
//!   registered, a writer task takes sole ownership of the socket's write
//!   half, and the reader loop enforces the liveness window until the
//!   session tears down.
//!
//! [`serve`] assembles all of the above for standalone use.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod app;
pub mod error;
pub mod ws;

// Re-export server types
pub use app::{AppState, router, run_pump, serve};
pub use error::ServerError;
