//! Fluent builder for git invocations
//!
//! All git calls go through [`GitCommand`] so that logging, timeouts and the
//! mapping of failures onto [`StackError`] are the same everywhere.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::GIT_COMMAND_TIMEOUT;
use crate::core::StackError;
use crate::utils::platform::get_git_command;

/// A git command waiting to be executed.
///
/// ```rust,no_run
/// use stackctl::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// GitCommand::new()
///     .args(["rev-parse", "--verify", "HEAD"])
///     .current_dir("/path/to/checkout")
///     .execute_success()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GitCommand {
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env_vars: Vec<(String, String)>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            env_vars: Vec::new(),
            timeout_duration: Some(GIT_COMMAND_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

/// Captured output of a successful command.
#[derive(Debug)]
pub struct GitCommandOutput {
    /// stdout, lossily decoded
    pub stdout: String,
    /// stderr, lossily decoded
    pub stderr: String,
}

impl GitCommand {
    /// An empty command with the default timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run inside `dir` (passed as `git -C <dir>`).
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Label used in log lines.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Shallow, single-branch clone of `url` into `target`.
    #[must_use]
    pub fn clone_shallow(url: &str, branch: Option<&str>, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().args(["clone", "--depth", "1", "--single-branch"]);
        if let Some(branch) = branch {
            cmd = cmd.args(["--branch", branch]);
        }
        cmd = cmd
            .arg("--recurse-submodules")
            .arg(url)
            .arg(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// Shallow pull of `branch` from `origin`.
    ///
    /// Output is forced to the C locale so it can be matched.
    #[must_use]
    pub fn pull_shallow(branch: Option<&str>) -> Self {
        let cmd = Self::new()
            .args(["pull", "--depth", "1", "--recurse-submodules", "origin"])
            .env("LC_ALL", "C");
        match branch {
            Some(branch) => cmd.arg(branch),
            None => cmd,
        }
    }

    fn operation(&self) -> String {
        self.args.first().cloned().unwrap_or_else(|| "unknown".to_string())
    }

    /// Run the command, failing on a non-zero exit code.
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(dir) = &self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        cmd.args(&full_args);

        match &self.context {
            Some(ctx) => tracing::debug!(
                target: "git",
                "({}) Executing command: {} {}",
                ctx,
                git_command,
                full_args.join(" ")
            ),
            None => tracing::debug!(
                target: "git",
                "Executing command: {} {}",
                git_command,
                full_args.join(" ")
            ),
        }

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output_future = cmd.output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "git",
                        "Command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    );
                    return Err(StackError::GitCommandError {
                        operation: self.operation(),
                        stderr: format!("timed out after {} seconds", duration.as_secs()),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StackError::GitNotFound.into());
            }
            Err(e) => {
                return Err(e).context(format!("Failed to execute git {}", full_args.join(" ")));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "Command failed with exit code {:?}: {}",
                output.status.code(),
                stderr.trim()
            );

            let error = if self.args.first().is_some_and(|a| a == "clone") {
                StackError::GitCloneFailed {
                    url: self.clone_url.clone().unwrap_or_else(|| "unknown".to_string()),
                    reason: stderr,
                }
            } else {
                StackError::GitCommandError {
                    operation: self.operation(),
                    stderr: if stderr.is_empty() { stdout } else { stderr },
                }
            };
            return Err(error.into());
        }

        if !stderr.trim().is_empty() {
            tracing::trace!(target: "git", "{}", stderr.trim());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Run and discard output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}
