//! Core types, errors, and utilities for the livemark reload service.
//!
//! This crate provides the foundational pieces shared across the workspace:
//!
//! - Configuration structures for the watcher, sessions, and server
//! - The [`ConfigError`] type for configuration failures
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;

pub use config::{Config, ServerConfig, SessionConfig, WatchConfig};
pub use error::ConfigError;
pub use hash::{FxHashMap, FxHashSet};
