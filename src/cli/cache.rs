//! `stackctl cache`: manage the download cache.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::cache::Cache;
use crate::config::{Config, RunSettings};

/// Command to manage the download cache.
#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommands,
}

#[derive(Subcommand)]
enum CacheSubcommands {
    /// Remove cached files of the configured project, or everything without -c
    Clear,
}

impl CacheCommand {
    pub async fn execute(self, configs: &[String], settings: RunSettings) -> Result<()> {
        match self.command {
            CacheSubcommands::Clear => {
                let cache = if configs.is_empty() {
                    Cache::with_dir(settings.cache_root()?)?
                } else {
                    let config = Config::load(configs, settings).await?;
                    config.cache().clone()
                };
                cache.clear().await?;
                eprintln!("{} {}", "Cleared".green(), cache.dir().display());
            }
        }
        Ok(())
    }
}
