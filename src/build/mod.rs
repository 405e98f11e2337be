//! Source build pipeline
//!
//! Turns a buildable [`Source`] into a binary path:
//!
//! 1. render the binary name template;
//! 2. with a local `path` and no forced rebuild, return `path/<binary>` if it exists;
//! 3. pick the working directory: the local path, or a shallow clone of `repo`
//!    under the `build` cache category (kept across runs, pulled again only
//!    on a forced rebuild). Clones are staged in a temporary sibling and
//!    renamed into place; a checkout without a `HEAD` commit is discarded;
//! 4. without a forced rebuild, return the binary if the directory already has it;
//! 5. render and run each build command in the working directory;
//! 6. require the binary to exist, else [`StackError::BuildIncomplete`].
//!
//! A build command is split with shell quoting rules. Leading `KEY=VALUE`
//! words become environment variables of the child; the first other word is
//! the program and the rest its arguments.

pub mod binary;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tera::Context as TeraContext;

use crate::cache::{Cache, Category};
use crate::core::StackError;
use crate::git::GitRepo;
use crate::resolver::repo::Source;
use crate::templating::render;
use crate::utils::fs::ensure_dir;

pub use binary::{ComponentKind, resolve_binary};

/// A build command split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    /// Leading `KEY=VALUE` assignments
    pub env: Vec<(String, String)>,
    /// Program to run
    pub program: String,
    /// Its arguments
    pub args: Vec<String>,
}

impl BuildCommand {
    /// Split a rendered command line.
    pub fn parse(line: &str) -> Result<Self, StackError> {
        let failed = |reason: &str| StackError::BuildCommandFailed {
            command: line.to_string(),
            reason: reason.to_string(),
        };

        let words = shlex::split(line).ok_or_else(|| failed("unbalanced quotes"))?;
        let mut env = Vec::new();
        let mut rest = words.into_iter();
        let program = loop {
            match rest.next() {
                Some(word) => match word.split_once('=') {
                    Some((key, value)) => env.push((key.to_string(), value.to_string())),
                    None => break word,
                },
                None => return Err(failed("no program to run")),
            }
        };

        Ok(Self {
            env,
            program,
            args: rest.collect(),
        })
    }
}

/// Builds sources for one run.
#[derive(Debug)]
pub struct SourceBuilder<'a> {
    cache: &'a Cache,
    context: &'a TeraContext,
    force: bool,
}

impl<'a> SourceBuilder<'a> {
    /// A builder rendering templates against `context`.
    #[must_use]
    pub const fn new(cache: &'a Cache, context: &'a TeraContext) -> Self {
        Self {
            cache,
            context,
            force: false,
        }
    }

    /// Rebuild even when a binary exists, pulling clones first.
    #[must_use]
    pub const fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Build `source` (declared by `name`) and return the binary path.
    pub async fn build(&self, name: &str, source: &Source) -> Result<PathBuf> {
        let binary = render(&format!("{name} binary"), &source.binary, self.context)?;
        if binary.trim().is_empty() {
            return Err(StackError::BuildIncomplete {
                binary: format!("<{name}: no binary name declared>"),
            }
            .into());
        }

        if let Some(local) = &source.path {
            let candidate = Path::new(local).join(&binary);
            if !self.force && candidate.exists() {
                tracing::debug!("Reusing {} for {}", candidate.display(), name);
                return Ok(candidate);
            }
        }

        let dir = match &source.path {
            Some(local) => PathBuf::from(local),
            None => self.checkout(name, source).await?,
        };
        let binary_path = dir.join(&binary);

        if !self.force && binary_path.exists() {
            tracing::debug!("Reusing previously built {}", binary_path.display());
            return Ok(binary_path);
        }

        for (index, template) in source.build_cmds.iter().enumerate() {
            let line = render(&format!("{name} build command {}", index + 1), template, self.context)?;
            let command = BuildCommand::parse(&line)?;
            self.run(&line, &command, &dir).await?;
        }

        if !binary_path.exists() {
            return Err(StackError::BuildIncomplete {
                binary: binary_path.display().to_string(),
            }
            .into());
        }
        tracing::info!("Built {} for {}", binary_path.display(), name);
        Ok(binary_path)
    }

    async fn checkout(&self, name: &str, source: &Source) -> Result<PathBuf> {
        let url = source.remote().ok_or_else(|| StackError::BuildCommandFailed {
            command: name.to_string(),
            reason: "source declares neither a path nor a repo".to_string(),
        })?;
        let dir = self.cache.keyed_path(Category::Build, url, "");
        let deadline = self.cache.deadline();
        let repo = GitRepo::new(&dir);

        if dir.exists() && !repo.has_head().await {
            tracing::warn!(target: "git", "Discarding incomplete checkout {}", dir.display());
            tokio::fs::remove_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to remove {}", dir.display()))?;
        }

        if dir.exists() {
            if self.force {
                let updated = deadline.run("git pull", repo.pull(source.reference.as_deref())).await?;
                if !updated {
                    tracing::debug!(target: "git", "{} already up to date", dir.display());
                }
            }
            return Ok(dir);
        }

        // Clone next to the final directory and move it into place once complete.
        let parent = self.cache.category_dir(Category::Build);
        ensure_dir(&parent)?;
        let staging = tempfile::TempDir::new_in(&parent)
            .with_context(|| format!("Failed to create staging directory in {}", parent.display()))?;
        let target = staging.path().join("checkout");
        deadline
            .run(
                "git clone",
                GitRepo::clone_shallow(url, source.reference.as_deref(), &target),
            )
            .await?;
        tokio::fs::rename(&target, &dir)
            .await
            .with_context(|| format!("Failed to move checkout into {}", dir.display()))?;
        Ok(dir)
    }

    async fn run(&self, line: &str, command: &BuildCommand, dir: &Path) -> Result<()> {
        tracing::debug!("Running build command '{}' in {}", line, dir.display());

        let mut child = tokio::process::Command::new(&command.program);
        child
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = self
            .cache
            .deadline()
            .run("build command", async {
                child.output().await.map_err(|e| {
                    anyhow::Error::from(StackError::BuildCommandFailed {
                        command: line.to_string(),
                        reason: e.to_string(),
                    })
                })
            })
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!("Build command output: {}", String::from_utf8_lossy(&output.stdout).trim());
            return Err(StackError::BuildCommandFailed {
                command: line.to_string(),
                reason: format!("{}: {}", output.status, stderr.trim()),
            })
            .with_context(|| format!("in {}", dir.display()));
        }
        Ok(())
    }
}
