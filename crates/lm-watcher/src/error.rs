//! Error types for the lm-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while watching directories.

use camino::Utf8PathBuf;

/// Errors that can occur during directory watching.
///
/// # Error Recovery Strategy
///
/// - **Init** ([`WatchError::Init`]): fatal - the live-reload feature cannot
///   start without the OS notification primitive
/// - **AddDirectory** ([`WatchError::AddDirectory`]): non-fatal - one
///   directory failed to register; already-watched directories and active
///   sessions are unaffected
/// - **NotInitialized** ([`WatchError::NotInitialized`]): non-fatal -
///   registration was attempted after teardown
/// - **Stream** ([`WatchError::Stream`]): non-fatal - a runtime error from
///   the OS event stream, forwarded on the error channel while the watch
///   loop keeps running
/// - **PathNotFound** / **Io**: fatal - the root must exist and be readable
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The OS notification primitive could not be started.
    #[error("failed to initialize filesystem watcher: {0}")]
    Init(#[source] notify::Error),

    /// A specific directory could not be registered with the OS primitive.
    #[error("failed to watch directory {path}: {source}")]
    AddDirectory {
        /// The directory that failed to register.
        path: Utf8PathBuf,
        /// The underlying registration failure.
        #[source]
        source: notify::Error,
    },

    /// A registration was attempted after the watcher was closed.
    #[error("watcher is not initialized")]
    NotInitialized,

    /// The watch root does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// A runtime error surfaced by the OS event stream.
    #[error("filesystem watcher error: {0}")]
    Stream(#[source] notify::Error),

    /// An I/O error occurred during path validation or normalization.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchError {
    /// Returns `true` if this error ends the live-reload feature.
    ///
    /// Non-fatal errors are contained: a failed directory registration or a
    /// runtime stream error leaves the watch loop and every session running.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Init(_) | Self::PathNotFound(_) | Self::Io(_))
    }

    /// Returns the directory associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::AddDirectory { path, .. } | Self::PathNotFound(path) => Some(path),
            Self::Init(_) | Self::NotInitialized | Self::Stream(_) | Self::Io(_) => None,
        }
    }
}
