//! Error types for the lm-reload crate.
//!
//! This module provides the [`SessionError`] type for I/O failures on one
//! subscriber session. Session errors are always contained: they tear down
//! the session they occurred on and never propagate to the broker loop or
//! to other sessions.

/// An I/O failure on one subscriber session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A write on the session connection failed.
    #[error("failed to write to session connection: {0}")]
    Write(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A read on the session connection failed.
    #[error("failed to read from session connection: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The peer sent nothing (not even a pong) within the liveness window.
    #[error("session liveness window expired")]
    LivenessExpired,
}

impl SessionError {
    /// Wraps a connection write failure.
    pub fn write(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Write(Box::new(source))
    }

    /// Wraps a connection read failure.
    pub fn read(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Read(Box::new(source))
    }
}
