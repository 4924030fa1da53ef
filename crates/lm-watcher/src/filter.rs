//! Path filtering for change events.
//!
//! This module provides the content boundary applied before any event
//! reaches the debouncer: editor artifacts (vim swap files, backup files,
//! Finder metadata) must never trigger a reload, under any timing.
//!
//! # Design
//!
//! The [`PathFilter`] trait is a simple predicate over the changed path.
//! The default filter is [`EditorArtifactFilter`]; embedders with other
//! noise sources can compose additional filters with [`CompositeFilter`].
//!
//! # Examples
//!
//! ```
//! use lm_watcher::{EditorArtifactFilter, PathFilter};
//! use camino::Utf8Path;
//!
//! let filter = EditorArtifactFilter;
//!
//! // Real content changes pass
//! assert!(filter.should_notify(Utf8Path::new("docs/readme.md")));
//!
//! // Editor artifacts never do
//! assert!(!filter.should_notify(Utf8Path::new("docs/.readme.md.swp")));
//! assert!(!filter.should_notify(Utf8Path::new("docs/readme.md~")));
//! ```

use camino::Utf8Path;

/// A predicate deciding whether a changed path is change-worthy.
///
/// Filters run on the async watch loop for every raw event, before the
/// debouncer. They must be [`Send`] + [`Sync`] + `'static` to be moved into
/// the watch task.
pub trait PathFilter: Send + Sync + 'static {
    /// Returns `true` if a change to `path` should produce a notification.
    fn should_notify(&self, path: &Utf8Path) -> bool;
}

/// A filter that treats every path as change-worthy.
///
/// Useful in tests and for embedders that do their own filtering upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl PathFilter for AcceptAllFilter {
    #[inline]
    fn should_notify(&self, _path: &Utf8Path) -> bool {
        true
    }
}

/// The default ignore filter for editor artifacts.
///
/// A change is never change-worthy when its file name:
///
/// - ends with `.swp` (vim swap files), or
/// - ends with `~` (backup files), or
/// - is exactly `.DS_Store` (Finder metadata), or
/// - is exactly `4913` (the probe file vim creates to test directory
///   writability)
///
/// Only the final path component is inspected; a directory named `backup~`
/// does not suppress changes to files inside it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditorArtifactFilter;

impl EditorArtifactFilter {
    /// Returns `true` if `name` is an editor artifact.
    fn is_artifact(name: &str) -> bool {
        name.ends_with(".swp") || name.ends_with('~') || name == ".DS_Store" || name == "4913"
    }
}

impl PathFilter for EditorArtifactFilter {
    fn should_notify(&self, path: &Utf8Path) -> bool {
        // Paths without a file name (e.g. the root) are never artifacts.
        path.file_name().is_none_or(|name| !Self::is_artifact(name))
    }
}

/// A composite filter combining multiple filters with AND logic.
///
/// All filters must agree for a path to be change-worthy. An empty
/// composite accepts everything.
///
/// # Examples
///
/// ```
/// use lm_watcher::{CompositeFilter, EditorArtifactFilter, PathFilter};
/// use camino::Utf8Path;
///
/// struct NoBuildDir;
/// impl PathFilter for NoBuildDir {
///     fn should_notify(&self, path: &Utf8Path) -> bool {
///         !path.as_str().contains("/target/")
///     }
/// }
///
/// let filter = CompositeFilter::new()
///     .and(EditorArtifactFilter)
///     .and(NoBuildDir);
///
/// assert!(filter.should_notify(Utf8Path::new("src/main.md")));
/// assert!(!filter.should_notify(Utf8Path::new("src/target/out.md")));
/// assert!(!filter.should_notify(Utf8Path::new("src/main.md~")));
/// ```
#[derive(Default)]
pub struct CompositeFilter {
    filters: Vec<Box<dyn PathFilter>>,
}

impl CompositeFilter {
    /// Creates a new empty composite filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Adds a filter to the composite.
    #[must_use]
    pub fn and<F: PathFilter>(mut self, filter: F) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl PathFilter for CompositeFilter {
    fn should_notify(&self, path: &Utf8Path) -> bool {
        self.filters.iter().all(|f| f.should_notify(path))
    }
}

impl<F: PathFilter + ?Sized> PathFilter for Box<F> {
    fn should_notify(&self, path: &Utf8Path) -> bool {
        (**self).should_notify(path)
    }
}
