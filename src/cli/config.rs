//! `stackctl config`: print or write the resolved configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use super::resolve_config;
use crate::config::RunSettings;
use crate::document::Format;

/// Command to output the resolved configuration.
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Print the resolved configuration to stdout
    Show {
        /// Output format
        #[arg(long, short, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Write the resolved configuration; the format follows the extension
    Write {
        /// Destination file (.yaml, .yml, .json or .toml)
        path: PathBuf,
    },
}

impl ConfigCommand {
    pub async fn execute(self, configs: &[String], settings: RunSettings) -> Result<()> {
        // Reject an unusable destination before doing any network work.
        if let ConfigSubcommands::Write {
            path,
        } = &self.command
        {
            Format::from_path(path)?;
        }

        let config = resolve_config(configs, settings).await?;
        match self.command {
            ConfigSubcommands::Show {
                format,
            } => {
                print!("{}", config.to_format(format)?);
            }
            ConfigSubcommands::Write {
                path,
            } => {
                config.write(&path)?;
                eprintln!("{} {}", "Wrote".green(), path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_show_format_parsing() {
        assert!(Cli::try_parse_from(["stackctl", "config", "show", "--format", "json"]).is_ok());
        assert!(Cli::try_parse_from(["stackctl", "config", "show", "--format", "yml"]).is_ok());
        assert!(Cli::try_parse_from(["stackctl", "config", "show", "--format", "ini"]).is_err());
    }

    #[tokio::test]
    async fn test_write_rejects_unknown_extension_early() {
        let cmd = ConfigCommand {
            command: ConfigSubcommands::Write {
                path: PathBuf::from("out.ini"),
            },
        };
        // Fails on the extension even though the root does not exist.
        let err = cmd
            .execute(&["/nonexistent/stack.yaml".to_string()], RunSettings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ini"));
    }
}
