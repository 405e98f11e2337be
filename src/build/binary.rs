//! Binary resolution for operators and tools.
//!
//! A published distribution for the running `<os>_<arch>` wins: it is fetched
//! into the component's cache category under its original file name, checked
//! against its `sha256Url` when one is declared, and made executable. Without
//! a matching distribution, or when a rebuild is forced, the component's
//! source is built instead.

use anyhow::{Context, Result};
use reqwest::Url;
use std::fmt;
use std::path::PathBuf;

use super::SourceBuilder;
use crate::cache::{Cache, Category, Naming};
use crate::core::StackError;
use crate::document::Reference;
use crate::resolver::repo::{Baremetal, BinaryDist};
use crate::resolver::RepoTree;
use crate::utils::fs::make_executable;
use crate::utils::platform_key;

/// Which section of the repo tree a component is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// `repos.operators`
    Operator,
    /// `repos.tools`
    Tool,
}

impl ComponentKind {
    const fn category(self) -> Category {
        match self {
            Self::Operator => Category::Operators,
            Self::Tool => Category::Tools,
        }
    }

    /// Find the baremetal declaration of `name`.
    pub fn lookup<'r>(self, repos: &'r RepoTree, name: &str) -> Result<&'r Baremetal> {
        let found = match self {
            Self::Operator => repos.operators.get(name),
            Self::Tool => repos.tools.get(name).and_then(|tool| tool.baremetal.as_ref()),
        };
        found.ok_or_else(|| {
            StackError::ComponentNotFound {
                kind: self.to_string(),
                name: name.to_string(),
            }
            .into()
        })
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator => f.write_str("operator"),
            Self::Tool => f.write_str("tool"),
        }
    }
}

/// Local path of an executable for `name`.
///
/// A distribution for the current platform wins unless the builder forces a
/// rebuild. The binary is set to mode 0700; a `file://` distribution is not
/// copied, so the user's own file is chmodded in place.
pub async fn resolve_binary(
    kind: ComponentKind,
    name: &str,
    baremetal: &Baremetal,
    builder: &SourceBuilder<'_>,
) -> Result<PathBuf> {
    let platform = platform_key();

    if !builder.force {
        if let Some(dist) = baremetal.binary.get(&platform) {
            return fetch_distribution(kind, name, dist, builder.cache)
                .await
                .with_context(|| format!("Failed to fetch {kind} '{name}' for {platform}"));
        }
    }

    match &baremetal.source {
        Some(source) => builder
            .build(name, source)
            .await
            .with_context(|| format!("Failed to build {kind} '{name}'")),
        None => Err(StackError::PlatformNotSupported {
            name: name.to_string(),
            platform,
        }
        .into()),
    }
}

async fn fetch_distribution(
    kind: ComponentKind,
    name: &str,
    dist: &BinaryDist,
    cache: &Cache,
) -> Result<PathBuf> {
    let parse = |raw: &str| {
        Url::parse(raw).map_err(|e| StackError::InvalidReference {
            reference: raw.to_string(),
            reason: e.to_string(),
        })
    };

    let mut reference = Reference::new(parse(&dist.url)?);
    reference.checksum = dist.sha256_url.as_deref().map(parse).transpose()?;

    let path = cache.resolve_as(&reference, kind.category(), Naming::Original).await?;
    let binary = match &dist.binary {
        Some(inner) if !inner.is_empty() => {
            path.parent().map_or_else(|| PathBuf::from(inner), |dir| dir.join(inner))
        }
        _ => path,
    };
    if !binary.exists() {
        return Err(StackError::BuildIncomplete {
            binary: binary.display().to_string(),
        }
        .into());
    }

    make_executable(&binary)?;
    tracing::debug!("Using {} {} at {}", kind, name, binary.display());
    Ok(binary)
}
