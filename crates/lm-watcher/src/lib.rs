//! Directory watcher with burst debouncing and async notification streaming.
//!
//! This crate bridges the synchronous `notify` file watching crate to the
//! async tokio runtime and turns raw filesystem chatter into discrete reload
//! notifications.
//!
//! # Overview
//!
//! The lm-watcher crate is designed to:
//!
//! - Detect writes and creations anywhere under a growing set of watched
//!   directories
//! - Drop editor artifacts (swap files, backup files) before they reach the
//!   debouncer
//! - Collapse save bursts into a single notification with a 100ms cooldown
//! - Stream notifications and watcher errors on separate channels for the
//!   serving layer to consume
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    notify watcher thread                       │
//! │  ┌──────────────────┐        ┌─────────────────────────────┐  │
//! │  │ RecommendedWatcher│ ────> │ raw event channel (bounded)  │  │
//! │  └──────────────────┘        └──────────────┬──────────────┘  │
//! └──────────────────────────────────────────────│─────────────────┘
//!                                                ▼
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    async watch loop (tokio)                    │
//! │   ignore filter ──> debouncer (Idle/Cooldown) ──> channels:    │
//! │                                        notifications / errors  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The watched-directory set grows at runtime: request handlers call
//! [`WatcherHandle::add_directory`] as navigation visits new subtrees, and
//! each directory is registered with the OS primitive at most once no matter
//! how many callers race on it.
//!
//! # Usage
//!
//! ```no_run
//! use lm_watcher::{DirectoryWatcher, EditorArtifactFilter};
//! use lm_core::WatchConfig;
//! use camino::Utf8Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lm_watcher::WatchError> {
//!     let config = WatchConfig::default();
//!     let (watcher, mut channels) = DirectoryWatcher::new(
//!         Utf8Path::new("/path/to/docs"),
//!         &config,
//!         EditorArtifactFilter,
//!     )
//!     .await?;
//!
//!     // Hand the cloneable handle to request handlers
//!     let handle = watcher.handle();
//!     handle.add_directory(Utf8Path::new("/path/to/docs/sub"))?;
//!
//!     // Consume notifications in an async loop
//!     while let Some(notification) = channels.notifications.recv().await {
//!         println!("change detected: {notification:?}");
//!     }
//!
//!     watcher.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod debounce;
pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export event types
pub use events::{ChangeEvent, ChangeKind, Notification};

// Re-export debounce types
pub use debounce::{DebounceDecision, Debouncer};

// Re-export filter types
pub use filter::{AcceptAllFilter, CompositeFilter, EditorArtifactFilter, PathFilter};

// Re-export watcher types
pub use watcher::{DirectoryWatcher, WatcherChannels, WatcherHandle};
