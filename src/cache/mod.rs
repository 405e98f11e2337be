//! Content-addressed resource cache
//!
//! Every remote resource a run touches (configuration documents, repo
//! documents, data files, binaries and their checksum sidecars) is stored
//! under one project namespace:
//!
//! ```text
//! <cache root>/<project>/
//! ├── configs/    # included documents
//! ├── repos/      # repo documents
//! ├── files/      # file entries declared by repos
//! ├── template/   # rendered copies of template file entries
//! ├── operators/  # operator binaries (original file name kept)
//! ├── tools/      # tool binaries (original file name kept)
//! └── build/      # source clones
//! ```
//!
//! A cache file is named after the first 16 bytes of the SHA-256 of the
//! resource URL, hex-encoded, followed by the URL's extension. Local
//! (`file://`) references bypass the cache entirely.
//!
//! # Hits and integrity
//!
//! A present file is a hit and is returned without touching the network. When
//! the caller supplies a checksum location and a `.sha256` sidecar from an
//! earlier fetch is present, the hit is re-verified first. A file that failed
//! verification therefore keeps failing with
//! [`StackError::ChecksumMismatch`] until it is removed; it is never handed
//! out as a valid hit.

pub mod download;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};

use crate::constants::CHECKSUM_SUFFIX;
use crate::core::{Deadline, StackError};
use crate::document::Reference;
use crate::document::reference::{extension, file_name};
use crate::utils::fs::{cache_key, ensure_dir, sha256_file};

/// Sub-directories of a project namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Included configuration documents
    Configs,
    /// Repo documents
    Repos,
    /// File entries declared by repos
    Files,
    /// Rendered template copies
    Template,
    /// Operator binaries
    Operators,
    /// Tool binaries
    Tools,
    /// Source clones
    Build,
}

impl Category {
    /// Directory name inside the project namespace.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Configs => "configs",
            Self::Repos => "repos",
            Self::Files => "files",
            Self::Template => "template",
            Self::Operators => "operators",
            Self::Tools => "tools",
            Self::Build => "build",
        }
    }
}

/// How the file name of a cache entry is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    /// Hash of the URL plus its extension
    Hashed,
    /// The URL's own last path segment
    Original,
}

/// A project namespace in the resource cache.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    client: Client,
    deadline: Deadline,
}

impl Cache {
    /// Open a namespace rooted at `dir`.
    pub fn with_dir(dir: PathBuf) -> Result<Self> {
        Ok(Self {
            dir,
            client: download::http_client()?,
            deadline: Deadline::none(),
        })
    }

    /// Abandon fetches once `deadline` passes.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Root of the project namespace.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deadline shared with everything that uses this cache.
    #[must_use]
    pub const fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Directory of `category`.
    #[must_use]
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.dir.join(category.dir_name())
    }

    /// Hashed cache path for `identity` with `ext` (including the dot) appended.
    #[must_use]
    pub fn keyed_path(&self, category: Category, identity: &str, ext: &str) -> PathBuf {
        self.category_dir(category).join(format!("{}{}", cache_key(identity), ext))
    }

    /// Cache path `url` would occupy under `naming`.
    pub fn path_for(&self, category: Category, url: &Url, naming: Naming) -> Result<PathBuf> {
        match naming {
            Naming::Hashed => Ok(self.keyed_path(category, url.as_str(), &extension(url))),
            Naming::Original => {
                let name = file_name(url).ok_or_else(|| StackError::InvalidReference {
                    reference: url.to_string(),
                    reason: "URL has no file name".to_string(),
                })?;
                Ok(self.category_dir(category).join(name))
            }
        }
    }

    /// Local path of `reference`, fetching it into `category` on a miss.
    pub async fn resolve(&self, reference: &Reference, category: Category) -> Result<PathBuf> {
        self.resolve_as(reference, category, Naming::Hashed).await
    }

    /// Like [`resolve`](Self::resolve), choosing how the cache file is named.
    pub async fn resolve_as(
        &self,
        reference: &Reference,
        category: Category,
        naming: Naming,
    ) -> Result<PathBuf> {
        if reference.is_local() {
            return reference.url.to_file_path().map_err(|()| {
                StackError::InvalidReference {
                    reference: reference.to_string(),
                    reason: "not a local file path".to_string(),
                }
                .into()
            });
        }

        let path = self.path_for(category, &reference.url, naming)?;
        let checksum_path = checksum_path(&path);

        if path.exists() {
            if reference.checksum.is_some() && checksum_path.exists() {
                verify_checksum(&path, &checksum_path).await?;
            }
            tracing::trace!("Cache hit for {} at {}", reference, path.display());
            return Ok(path);
        }

        self.deadline.check("fetch")?;
        ensure_dir(path.parent().unwrap_or(&self.dir))?;

        if let Some(checksum_url) = &reference.checksum {
            self.fetch(checksum_url, &checksum_path).await?;
        }
        self.fetch(&reference.url, &path).await?;

        if reference.checksum.is_some() {
            verify_checksum(&path, &checksum_path).await?;
        }

        tracing::debug!("Cached {} at {}", reference, path.display());
        Ok(path)
    }

    async fn fetch(&self, url: &Url, dest: &Path) -> Result<()> {
        let operation = format!("fetch of {url}");
        if url.scheme() == "file" {
            return download::copy_local(url, dest).await;
        }
        self.deadline.run(&operation, download::download(&self.client, url, dest)).await
    }

    /// Remove the whole project namespace.
    pub async fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            tokio::fs::remove_dir_all(&self.dir)
                .await
                .with_context(|| format!("Failed to clear cache at {}", self.dir.display()))?;
            tracing::info!("Cleared cache at {}", self.dir.display());
        }
        Ok(())
    }
}

/// Sidecar path holding the published checksum of `path`.
#[must_use]
pub fn checksum_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(CHECKSUM_SUFFIX);
    path.with_file_name(name)
}

/// Compare `path` against the first token of the sidecar, case-insensitively.
pub async fn verify_checksum(path: &Path, checksum_path: &Path) -> Result<()> {
    let published = tokio::fs::read_to_string(checksum_path)
        .await
        .with_context(|| format!("Failed to read checksum {}", checksum_path.display()))?;
    let expected = published.split_whitespace().next().unwrap_or_default().to_ascii_lowercase();
    let actual = sha256_file(path).await?;

    if expected != actual {
        return Err(StackError::ChecksumMismatch {
            path: path.display().to_string(),
            expected,
            actual,
        }
        .into());
    }
    tracing::trace!("Checksum verified for {}", path.display());
    Ok(())
}
