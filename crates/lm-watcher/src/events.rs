//! Event and notification types for the watch pipeline.
//!
//! Raw `notify` events are flattened into [`ChangeEvent`]s (one per affected
//! path), which the filter and debouncer consume. What ultimately leaves the
//! crate is the much coarser [`Notification`]: an opaque reload signal with
//! no payload, because subscribers refresh wholesale rather than per file.
//!
//! # Event Flow
//!
//! ```text
//! notify::Event
//!      │  (one per path, non-UTF-8 paths skipped)
//!      ▼
//! ChangeEvent { path, kind, timestamp }
//!      │  (ignore filter, qualifying-kind check, debounce)
//!      ▼
//! Notification::Reload
//! ```

use std::time::Instant;

use camino::Utf8PathBuf;
use notify::EventKind;
use notify::event::ModifyKind;

/// The kind of filesystem change a [`ChangeEvent`] describes.
///
/// Only writes and creations qualify for reload notification; everything
/// else (metadata changes, removals, renames) is classified as [`Other`]
/// and dropped before the debouncer.
///
/// [`Other`]: ChangeKind::Other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// File contents were written.
    Write,
    /// A file or directory was created.
    Create,
    /// Any other operation (metadata, removal, rename).
    Other,
}

impl ChangeKind {
    /// Returns `true` if events of this kind qualify for notification.
    #[inline]
    #[must_use]
    pub const fn qualifies(self) -> bool {
        matches!(self, Self::Write | Self::Create)
    }
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::Create,
            EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Self::Write,
            _ => Self::Other,
        }
    }
}

/// A single filesystem change with a UTF-8 path guarantee.
///
/// Ephemeral: produced from the raw OS event stream, consumed by the ignore
/// filter and the debouncer, never stored.
///
/// # Examples
///
/// ```
/// use lm_watcher::{ChangeEvent, ChangeKind};
/// use camino::Utf8PathBuf;
///
/// let event = ChangeEvent::new(Utf8PathBuf::from("docs/readme.md"), ChangeKind::Write);
/// assert!(event.kind.qualifies());
/// assert_eq!(event.file_name(), Some("readme.md"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The path the change applies to.
    pub path: Utf8PathBuf,

    /// What happened to the path.
    pub kind: ChangeKind,

    /// When the event was received, on the monotonic clock.
    pub timestamp: Instant,
}

impl ChangeEvent {
    /// Creates a change event stamped with the current instant.
    #[inline]
    #[must_use]
    pub fn new(path: Utf8PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            timestamp: Instant::now(),
        }
    }

    /// Returns the file name component of the changed path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

/// An opaque reload signal delivered to subscribers.
///
/// Carries no payload: any qualifying change anywhere under the watched
/// set means "refresh". Watcher failures travel on the paired error
/// channel, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// Watched content changed; subscribers should refresh.
    Reload,
}

impl Notification {
    /// The literal text frame payload pushed to subscribers.
    #[inline]
    #[must_use]
    pub const fn payload(self) -> &'static str {
        match self {
            Self::Reload => "reload",
        }
    }
}
