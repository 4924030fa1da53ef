//! Configuration structures for the livemark reload service.
//!
//! This module provides configuration types for all components of the service:
//!
//! - [`WatchConfig`] - File watcher settings (debounce window, channel sizing)
//! - [`SessionConfig`] - Subscriber session settings (liveness, mailboxes)
//! - [`ServerConfig`] - HTTP/WebSocket server settings (bind address, port)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] with the values the service
//! ships with, and deserialize leniently via `#[serde(default)]` so partial
//! configuration files remain valid.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the directory watcher.
///
/// Controls how filesystem changes are detected and debounced.
///
/// # Examples
///
/// ```
/// use lm_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.debounce_ms, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Cooldown window in milliseconds.
    ///
    /// After a notification is emitted, further qualifying events within
    /// this window are dropped rather than queued, collapsing editor save
    /// bursts into a single notification.
    pub debounce_ms: u64,

    /// Capacity of the raw event channel between the OS watcher thread and
    /// the async watch loop.
    pub event_channel_capacity: usize,
}

impl WatchConfig {
    /// The cooldown window as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            event_channel_capacity: 64,
        }
    }
}

/// Configuration for subscriber sessions.
///
/// Controls keepalive behavior and per-subscriber mailbox sizing.
///
/// # Examples
///
/// ```
/// use lm_core::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::default();
/// assert_eq!(config.liveness_window_secs, 60);
/// assert_eq!(config.ping_interval(), Duration::from_secs(54));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum silence (in seconds) tolerated on a connection before the
    /// peer is presumed dead and the session is torn down.
    pub liveness_window_secs: u64,

    /// Capacity of each subscriber's mailbox.
    ///
    /// A subscriber whose mailbox cannot absorb a broadcast without
    /// blocking is evicted rather than slowing the broker.
    pub mailbox_capacity: usize,
}

impl SessionConfig {
    /// The liveness window as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn liveness_window(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs)
    }

    /// The keepalive ping interval: 90% of the liveness window, so a ping
    /// and its pong always fit inside the window.
    #[inline]
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.liveness_window_secs * 9 / 10)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            liveness_window_secs: 60,
            mailbox_capacity: 8,
        }
    }
}

/// Configuration for the HTTP/WebSocket server.
///
/// # Examples
///
/// ```
/// use lm_core::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.port, 3030);
/// assert_eq!(config.bind_addr().to_string(), "127.0.0.1:3030");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: IpAddr,

    /// Port to listen on. Port `0` asks the OS for an ephemeral port.
    pub port: u16,
}

impl ServerConfig {
    /// The full socket address to bind.
    #[inline]
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3030,
        }
    }
}

/// Root configuration for the livemark service.
///
/// Combines all component configurations into a single structure that can be
/// loaded from a configuration file or constructed programmatically.
///
/// # Examples
///
/// ```
/// use lm_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("debounce_ms"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root directory to watch. Empty until set by the caller.
    pub root: Utf8PathBuf,

    /// Directory watcher configuration.
    pub watch: WatchConfig,

    /// Subscriber session configuration.
    pub session: SessionConfig,

    /// Server configuration.
    pub server: ServerConfig,
}

impl Config {
    /// Validates the configuration before the service starts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the watch root is unset or not a
    /// directory, or if a tuning option has a value the service cannot
    /// run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_str().is_empty() {
            return Err(ConfigError::InvalidPath {
                path: self.root.clone(),
                reason: "watch root is not set".to_owned(),
            });
        }

        if !self.root.is_dir() {
            return Err(ConfigError::MissingDirectory(self.root.clone()));
        }

        if self.watch.debounce_ms == 0 {
            return Err(ConfigError::InvalidOption {
                option: "debounce_ms".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }

        if self.session.mailbox_capacity == 0 {
            return Err(ConfigError::InvalidOption {
                option: "mailbox_capacity".to_owned(),
                reason: "must be positive".to_owned(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.event_channel_capacity, 64);
        assert_eq!(config.debounce_window(), Duration::from_millis(100));
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.liveness_window_secs, 60);
        assert_eq!(config.mailbox_capacity, 8);
    }

    #[test]
    fn test_ping_interval_is_nine_tenths_of_window() {
        let config = SessionConfig {
            liveness_window_secs: 60,
            mailbox_capacity: 8,
        };
        assert_eq!(config.ping_interval(), Duration::from_secs(54));
        assert!(config.ping_interval() < config.liveness_window());
    }

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3030);
        assert!(config.host.is_loopback());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"watch": {"debounce_ms": 250}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.watch.debounce_ms, 250);
        // Other fields should have defaults
        assert_eq!(config.session.liveness_window_secs, 60);
        assert_eq!(config.server.port, 3030);
    }

    #[test]
    fn test_validate_rejects_unset_root() {
        let config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let mut config = Config::default();
        config.root = Utf8PathBuf::from("/nonexistent/never/here");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingDirectory(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_options() {
        let mut config = Config::default();
        config.root = Utf8PathBuf::from(".");
        config.watch.debounce_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { .. })
        ));

        config.watch.debounce_ms = 100;
        config.session.mailbox_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_working_directory() {
        let mut config = Config::default();
        config.root = Utf8PathBuf::from(".");
        assert!(config.validate().is_ok());
    }
}
