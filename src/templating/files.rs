//! File pass: fetch every file entry of the repo tree and render the ones
//! flagged as templates.
//!
//! Rendered copies live in the `template` cache category under the same
//! hashed naming as fetched resources. They are rendered again on every run,
//! since the context may have changed.

use anyhow::{Context, Result};
use reqwest::Url;
use tera::Context as TeraContext;

use crate::cache::{Cache, Category};
use crate::core::{ErrorSet, StackError};
use crate::document::Reference;
use crate::document::reference::extension;
use crate::resolver::repo::FileEntry;
use crate::resolver::RepoTree;
use crate::utils::fs::atomic_write;

/// Resolve each file entry to a local path, rendering template entries.
///
/// Every entry gets its `path` set. Failures of individual entries are
/// collected and reported together.
pub async fn render_files(repos: &mut RepoTree, cache: &Cache, context: &TeraContext) -> Result<()> {
    let mut errors = ErrorSet::default();

    for (name, entry) in &mut repos.files {
        if entry.url.is_none() {
            tracing::debug!("File '{}' declares no url, skipping", name);
            continue;
        }
        let result = render_file(entry, cache, context)
            .await
            .with_context(|| format!("Failed to prepare file '{name}'"));
        errors.collect(result);
    }

    errors.finish()
}

async fn render_file(entry: &mut FileEntry, cache: &Cache, context: &TeraContext) -> Result<()> {
    let raw = entry.url.as_deref().unwrap_or_default();
    let url = Url::parse(raw).map_err(|e| StackError::InvalidReference {
        reference: raw.to_string(),
        reason: e.to_string(),
    })?;
    let reference = Reference::new(url);
    let fetched = cache.resolve(&reference, Category::Files).await?;

    if !entry.template {
        entry.path = Some(fetched);
        return Ok(());
    }

    let source = tokio::fs::read_to_string(&fetched)
        .await
        .with_context(|| format!("Failed to read template {}", fetched.display()))?;
    let rendered = super::render(reference.identity(), &source, context)?;

    let target = cache.keyed_path(Category::Template, reference.identity(), &extension(&reference.url));
    atomic_write(&target, rendered.as_bytes())?;
    tracing::debug!("Rendered {} -> {}", reference, target.display());

    entry.path = Some(target);
    Ok(())
}
