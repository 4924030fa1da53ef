//! CLI entry point for the livemark reload server.
//!
//! This binary watches a directory tree and pushes `reload` frames over
//! WebSocket to connected preview sessions whenever content changes.
//!
//! # Usage
//!
//! ```bash
//! # Watch the current directory on the default port
//! livemark
//!
//! # Watch a specific tree on a specific port
//! livemark /path/to/docs --port 8080
//!
//! # Debug logging
//! livemark --verbose
//! ```
//!
//! Preview clients connect to `ws://<host>:<port>/ws` and refresh on each
//! `reload` text frame.

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::net::IpAddr;

use camino::Utf8PathBuf;
use clap::Parser;
use lm_core::Config;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Serve live-reload notifications for a directory tree.
///
/// Watches the given root (and any directories registered later) and pushes
/// a `reload` frame to every connected WebSocket session when content
/// changes.
#[derive(Parser)]
#[command(name = "livemark", version, about, long_about = None)]
struct Cli {
    /// Directory to watch.
    #[arg(default_value = ".", env = "LIVEMARK_ROOT")]
    root: Utf8PathBuf,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1", env = "LIVEMARK_HOST")]
    host: IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 3030, env = "LIVEMARK_PORT")]
    port: u16,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Noisy crates like `hyper` and `notify` are filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},hyper=warn,mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a [`Config`] from CLI arguments.
///
/// Validates that the root exists and is a directory, and normalizes it.
///
/// # Errors
///
/// Returns an error if the root doesn't exist or isn't a directory.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    if !cli.root.exists() {
        return Err(color_eyre::eyre::eyre!(
            "Path does not exist: {}",
            cli.root
        ));
    }

    if !cli.root.is_dir() {
        return Err(color_eyre::eyre::eyre!(
            "Path is not a directory: {}",
            cli.root
        ));
    }

    let mut config = Config::default();
    config.root = cli.root.canonicalize_utf8()?;
    config.server.host = cli.host;
    config.server.port = cli.port;
    config.validate()?;

    Ok(config)
}

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Install color-eyre first, before any potential panics
    color_eyre::install()?;

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.no_color);

    let config = build_config(&cli)?;
    info!(root = %config.root, "starting livemark");

    lm_server::serve(config)
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Server error: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["livemark"]);
        assert_eq!(cli.root, Utf8PathBuf::from("."));
        assert_eq!(cli.port, 3030);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_custom_root_and_port() {
        let cli = Cli::parse_from(["livemark", "/srv/docs", "--port", "8080"]);
        assert_eq!(cli.root, Utf8PathBuf::from("/srv/docs"));
        assert_eq!(cli.port, 8080);
    }

    #[test]
    fn test_build_config_rejects_missing_root() {
        let cli = Cli::parse_from(["livemark", "/nonexistent/never/here"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_build_config_normalizes_root() {
        let cli = Cli::parse_from(["livemark", "."]);
        let config = build_config(&cli).expect("Current directory should be valid");
        assert!(config.root.is_absolute());
        assert_eq!(config.server.port, 3030);
    }
}
