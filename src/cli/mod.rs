//! Command-line interface for stackctl.
//!
//! Every command works on the configuration given with `-c/--config`
//! (repeatable; earlier documents win):
//!
//! - `config show [--format yaml|json|toml]`: print the resolved tree
//! - `config write <PATH>`: write the resolved tree, format by extension
//! - `cache clear`: drop the project's cache namespace, or the whole cache
//!   when no configuration is given
//! - `operator path [--force-build]`: resolve the operator named in the
//!   `stackctl.operator` key and print its binary path
//!
//! Logging goes to stderr. `RUST_LOG` takes precedence over `-v`/`-q`.

mod cache;
mod config;
mod operator;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, RunSettings};
use crate::constants::DEFAULT_TIMEOUT;

/// Main CLI structure for stackctl.
#[derive(Parser)]
#[command(
    name = "stackctl",
    about = "Resolve layered service-stack configuration",
    version,
    long_about = "stackctl merges local and remote configuration documents, follows their \
                  includes and repos, renders templates, and resolves operator binaries."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration document, as a path or URL (repeatable, earlier wins)
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    configs: Vec<String>,

    /// Seconds allowed for resolution and for a binary build (0 disables)
    #[arg(
        long,
        value_name = "SECS",
        global = true,
        env = "STACKCTL_TIMEOUT",
        default_value_t = DEFAULT_TIMEOUT.as_secs()
    )]
    timeout: u64,

    /// Remove the project's cache namespace before resolving
    #[arg(long, global = true)]
    clear_cache: bool,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or write the resolved configuration
    Config(config::ConfigCommand),

    /// Manage the download cache
    Cache(cache::CacheCommand),

    /// Work with the configured operator
    Operator(operator::OperatorCommand),
}

impl Cli {
    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        let settings = self.build_settings();
        match self.command {
            Commands::Config(cmd) => cmd.execute(&self.configs, settings).await,
            Commands::Cache(cmd) => cmd.execute(&self.configs, settings).await,
            Commands::Operator(cmd) => cmd.execute(&self.configs, settings).await,
        }
    }

    /// Run settings derived from the global flags.
    #[must_use]
    pub fn build_settings(&self) -> RunSettings {
        RunSettings {
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            clear_cache: self.clear_cache,
            cache_dir: None,
        }
    }

    /// Filter directive selected by `-v`/`-q`.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    /// Install the stderr subscriber.
    pub fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.log_level())
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Load and resolve the configuration named on the command line.
async fn resolve_config(configs: &[String], settings: RunSettings) -> Result<Config> {
    if configs.is_empty() {
        bail!("No configuration given; pass at least one --config <PATH>");
    }
    let mut config = Config::load(configs, settings).await?;
    config.resolve().await?;
    Ok(config)
}
