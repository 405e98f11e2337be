//! `stackctl operator`: resolve the binary of the configured operator.

use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};

use super::resolve_config;
use crate::build::{ComponentKind, SourceBuilder, resolve_binary};
use crate::config::RunSettings;

/// Command to work with the operator named in `stackctl.operator`.
#[derive(Args)]
pub struct OperatorCommand {
    #[command(subcommand)]
    command: OperatorSubcommands,
}

#[derive(Subcommand)]
enum OperatorSubcommands {
    /// Fetch or build the operator and print the path of its binary
    Path {
        /// Rebuild from source even if a binary exists, pulling clones first
        #[arg(long)]
        force_build: bool,
    },
}

impl OperatorCommand {
    pub async fn execute(self, configs: &[String], settings: RunSettings) -> Result<()> {
        match self.command {
            OperatorSubcommands::Path {
                force_build,
            } => {
                let config = resolve_config(configs, settings).await?;
                let section = config.tool_section()?;
                let name = section.operator.ok_or_else(|| {
                    anyhow!("No operator configured; set 'stackctl.operator' in a document")
                })?;

                let baremetal = ComponentKind::Operator.lookup(config.repos(), &name)?;
                let context = config.template_context()?;
                // The binary gets its own deadline, separate from resolution.
                let cache = config.cache().clone().with_deadline(config.settings().deadline());
                let builder = SourceBuilder::new(&cache, &context).force(force_build);

                let path = resolve_binary(ComponentKind::Operator, &name, baremetal, &builder)
                    .await
                    .with_context(|| format!("Failed to resolve operator '{name}'"))?;
                println!("{}", path.display());
            }
        }
        Ok(())
    }
}
