//! Build automation tasks for the livemark workspace.
//!
//! Run with: `cargo xt <command>`
//!
//! # Available Commands
//!
//! - `check`: Run all checks (fmt, clippy, test)
//! - `fmt`: Format code with rustfmt
//! - `lint`: Run clippy with all targets
//! - `test`: Run all tests
//! - `build`: Build release binary
//! - `clean`: Clean build artifacts
//! - `doc`: Generate documentation

// xtask is a build tool - printing to stderr is expected
#![allow(clippy::print_stderr)]

use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

/// Build automation for livemark
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for livemark")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks (fmt --check, clippy, test)
    Check,
    /// Format code with rustfmt
    Fmt {
        /// Check formatting without modifying files
        #[arg(long)]
        check: bool,
    },
    /// Run clippy lints
    Lint {
        /// Automatically fix lint warnings
        #[arg(long)]
        fix: bool,
    },
    /// Run all tests
    Test {
        /// Run tests with release optimizations
        #[arg(long)]
        release: bool,
    },
    /// Build release binary
    Build {
        /// Build in debug mode
        #[arg(long)]
        debug: bool,
    },
    /// Clean build artifacts
    Clean,
    /// Generate documentation
    Doc {
        /// Open in browser after building
        #[arg(long)]
        open: bool,
    },
}

/// Runs `cargo` with the given arguments, failing on a non-zero exit.
fn cargo(args: &[&str]) -> Result<()> {
    eprintln!("xtask: cargo {}", args.join(" "));

    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("failed to run cargo {}", args.join(" ")))?;

    if !status.success() {
        bail!("cargo {} failed with {status}", args.join(" "));
    }

    Ok(())
}

fn fmt(check: bool) -> Result<()> {
    if check {
        cargo(&["fmt", "--all", "--", "--check"])
    } else {
        cargo(&["fmt", "--all"])
    }
}

fn lint(fix: bool) -> Result<()> {
    if fix {
        cargo(&["clippy", "--workspace", "--all-targets", "--fix", "--allow-dirty"])
    } else {
        cargo(&["clippy", "--workspace", "--all-targets"])
    }
}

fn test(release: bool) -> Result<()> {
    if release {
        cargo(&["test", "--workspace", "--release"])
    } else {
        cargo(&["test", "--workspace"])
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt(true)?;
            lint(false)?;
            test(false)?;
        }
        Commands::Fmt { check } => fmt(check)?,
        Commands::Lint { fix } => lint(fix)?,
        Commands::Test { release } => test(release)?,
        Commands::Build { debug } => {
            if debug {
                cargo(&["build", "-p", "lm-cli"])?;
            } else {
                cargo(&["build", "-p", "lm-cli", "--release"])?;
            }
        }
        Commands::Clean => cargo(&["clean"])?,
        Commands::Doc { open } => {
            if open {
                cargo(&["doc", "--workspace", "--no-deps", "--open"])?;
            } else {
                cargo(&["doc", "--workspace", "--no-deps"])?;
            }
        }
    }

    Ok(())
}
