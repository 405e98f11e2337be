//! Git checkouts used by the source build pipeline.
//!
//! Sources are fetched with the `git` CLI as shallow, single-branch clones.
//! A clone is reused on later runs once it has a `HEAD` commit; a forced
//! refresh pulls the branch again, and "already up to date" counts as success.

pub mod command_builder;

use anyhow::Result;
use std::path::{Path, PathBuf};

use command_builder::GitCommand;

/// Branch or tag name as `git clone --branch` expects it.
///
/// Accepts full ref names (`refs/heads/main`, `refs/tags/v1.0`) as well as
/// short names.
#[must_use]
pub fn short_ref(reference: &str) -> &str {
    reference
        .strip_prefix("refs/heads/")
        .or_else(|| reference.strip_prefix("refs/tags/"))
        .unwrap_or(reference)
}

/// A local checkout.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Wrap an existing checkout.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Shallow-clone `url` at `reference` into `target`.
    pub async fn clone_shallow(url: &str, reference: Option<&str>, target: &Path) -> Result<Self> {
        crate::utils::platform::ensure_git_available()?;
        tracing::debug!(target: "git", "Cloning {} into {}", url, target.display());
        GitCommand::clone_shallow(url, reference.map(short_ref), target)
            .with_context(url)
            .execute_success()
            .await?;
        Ok(Self::new(target))
    }

    /// Pull `reference` from `origin`.
    ///
    /// Returns `false` when the checkout was already up to date.
    pub async fn pull(&self, reference: Option<&str>) -> Result<bool> {
        tracing::debug!(target: "git", "Pulling {}", self.path.display());
        let output = GitCommand::pull_shallow(reference.map(short_ref))
            .current_dir(&self.path)
            .execute()
            .await?;
        let updated = !output.stdout.contains("Already up to date");
        Ok(updated)
    }

    /// Whether the checkout has a commit at `HEAD`.
    ///
    /// A clone killed half way leaves a `.git` directory without one.
    pub async fn has_head(&self) -> bool {
        if !self.path.join(".git").exists() {
            return false;
        }
        GitCommand::new()
            .args(["rev-parse", "--verify", "--quiet", "HEAD"])
            .current_dir(&self.path)
            .execute_success()
            .await
            .is_ok()
    }
}
