//! Settings of the tool itself, as opposed to the documents it resolves.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{CACHE_DIR_ENV, CACHE_ROOT_DIR, DEFAULT_TIMEOUT};
use crate::core::Deadline;

/// Root of all project cache namespaces.
///
/// `STACKCTL_CACHE_DIR` overrides the platform cache directory
/// (`~/.cache/stackctl` on Linux, `~/Library/Caches/stackctl` on macOS,
/// `%LOCALAPPDATA%\stackctl` on Windows).
pub fn get_cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Unable to determine the user cache directory"))?;
    Ok(base.join(CACHE_ROOT_DIR))
}

/// Options of one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Deadline for resolving, merging and rendering; `None` disables it
    pub timeout: Option<Duration>,
    /// Remove the project's cache namespace before resolving
    pub clear_cache: bool,
    /// Explicit cache root, bypassing [`get_cache_dir`]
    pub cache_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            clear_cache: false,
            cache_dir: None,
        }
    }
}

impl RunSettings {
    /// Deadline starting now.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        match self.timeout {
            Some(limit) if !limit.is_zero() => Deadline::after(limit),
            _ => Deadline::none(),
        }
    }

    /// Cache root to use.
    pub fn cache_root(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_cache_dir(),
        }
    }
}
