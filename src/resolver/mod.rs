//! Include and repo graph resolution
//!
//! Starting from the root documents given on the command line, the resolver
//! walks two independent link spaces:
//!
//! - **includes**: the top-level `include` list of a configuration document
//!   names further configuration documents (cache category `configs`);
//! - **repos**: a document's top-level `repos` section is a repo node whose own
//!   `include` list names further repo documents (cache category `repos`).
//!
//! Each link is resolved against the URL of the document declaring it, fetched
//! through the [`Cache`], decoded, and resolved recursively, depth first. The
//! consumed `include` / `repos` keys are removed from the node's data so they
//! never reach the merged output.
//!
//! # De-duplication
//!
//! Each link space has its own seen-set for the run. A URL is marked before it
//! is resolved; meeting it again (a cycle or a diamond) logs a warning and skips
//! it, so every document is resolved at most once.
//!
//! # Failures
//!
//! A failing child does not stop its siblings. All sibling failures are
//! collected and surfaced together once the whole sibling list was attempted.
//!
//! # Priority order
//!
//! [`Node::flatten`] yields a node, then the flattening of each child in
//! declaration order. Applied to the roots in command-line order, this is the
//! merge priority, highest first: a document outranks all its descendants, and
//! an earlier sibling's subtree outranks a later sibling's.
//!
//! ```text
//! R1 ─┬─ I1a          flatten: R1, I1a, I1b, R2, I2a
//!     └─ I1b
//! R2 ─── I2a
//! ```

pub mod repo;

use anyhow::{Context, Result};
use reqwest::Url;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::cache::{Cache, Category};
use crate::constants::{INCLUDE_KEY, REPOS_KEY};
use crate::core::ErrorSet;
use crate::document::{IncludeEntry, Reference, Tree, read_document, take_section};

pub use repo::{RepoNode, RepoTree};

/// A tree node with ordered children.
pub trait Node: Sized {
    /// Children in declaration order.
    fn children(&self) -> &[Self];

    /// Lazy pre-order walk over `self` and all descendants.
    ///
    /// The walk is restartable: every call starts a fresh sequence.
    fn flatten(&self) -> Flatten<'_, Self> {
        Flatten { stack: vec![self] }
    }
}

/// Iterator returned by [`Node::flatten`].
#[derive(Debug)]
pub struct Flatten<'a, N> {
    stack: Vec<&'a N>,
}

impl<'a, N: Node> Iterator for Flatten<'a, N> {
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev());
        Some(node)
    }
}

/// One resolved configuration document.
#[derive(Debug, Clone)]
pub struct DocumentNode {
    /// Where the document came from
    pub reference: Reference,
    /// Local path it was read from
    pub path: PathBuf,
    /// Decoded data, `include` and `repos` removed
    pub data: Tree,
    /// Included documents in declaration order
    pub includes: Vec<DocumentNode>,
    /// The document's `repos` section, if it had one
    pub repo: Option<RepoNode>,
}

impl Node for DocumentNode {
    fn children(&self) -> &[Self] {
        &self.includes
    }
}

impl DocumentNode {
    /// Repo nodes of this document and every included document, in priority order.
    pub fn flatten_repos(&self) -> impl Iterator<Item = &RepoNode> {
        self.flatten().filter_map(|doc| doc.repo.as_ref()).flat_map(|repo| repo.flatten())
    }
}

/// Walks include and repo links for one run.
#[derive(Debug)]
pub struct Resolver<'c> {
    cache: &'c Cache,
    seen_documents: HashSet<String>,
    seen_repos: HashSet<String>,
}

impl<'c> Resolver<'c> {
    /// A resolver with empty seen-sets.
    #[must_use]
    pub fn new(cache: &'c Cache) -> Self {
        Self {
            cache,
            seen_documents: HashSet::new(),
            seen_repos: HashSet::new(),
        }
    }

    /// Resolve every root, in order. Duplicate roots are skipped.
    pub async fn resolve_roots(&mut self, roots: &[Url]) -> Result<Vec<DocumentNode>> {
        let mut errors = ErrorSet::default();
        let mut nodes = Vec::with_capacity(roots.len());

        for url in roots {
            if !self.seen_documents.insert(url.to_string()) {
                tracing::warn!("Skipping duplicate root {}", url);
                continue;
            }
            let reference = Reference::new(url.clone());
            if let Some(node) = errors.collect(self.resolve_document(reference).await) {
                nodes.push(node);
            }
        }

        errors.finish()?;
        Ok(nodes)
    }

    async fn resolve_document(&mut self, reference: Reference) -> Result<DocumentNode> {
        tracing::debug!("Resolving document {}", reference);

        let path = self.cache.resolve(&reference, Category::Configs).await?;
        let mut data = read_document(&path)
            .await
            .with_context(|| format!("Failed to read document {reference}"))?;

        let entries: Vec<IncludeEntry> = take_section(&mut data, INCLUDE_KEY)
            .with_context(|| format!("Invalid include list in {reference}"))?
            .unwrap_or_default();
        let repo_section: Option<Tree> = take_section(&mut data, REPOS_KEY)
            .with_context(|| format!("Invalid repos section in {reference}"))?;

        let mut errors = ErrorSet::default();
        let mut includes = Vec::with_capacity(entries.len());

        for entry in &entries {
            let Some(child) = errors.collect(entry.to_reference(&reference.url).map_err(Into::into))
            else {
                continue;
            };
            if !self.seen_documents.insert(child.identity().to_string()) {
                tracing::warn!("Skipping already included document {} (from {})", child, reference);
                continue;
            }
            let resolved = Box::pin(self.resolve_document(child.clone()))
                .await
                .with_context(|| format!("Failed to resolve include {child}"));
            if let Some(node) = errors.collect(resolved) {
                includes.push(node);
            }
        }

        let repo = match repo_section {
            Some(section) => errors.collect(
                self.resolve_repo_section(reference.clone(), section)
                    .await
                    .with_context(|| format!("Failed to resolve repos of {reference}")),
            ),
            None => None,
        };

        errors.finish()?;

        Ok(DocumentNode {
            reference,
            path,
            data,
            includes,
            repo,
        })
    }

    async fn resolve_repo_document(&mut self, reference: Reference) -> Result<RepoNode> {
        tracing::debug!("Resolving repo {}", reference);

        let path = self.cache.resolve(&reference, Category::Repos).await?;
        let data = read_document(&path)
            .await
            .with_context(|| format!("Failed to read repo {reference}"))?;
        self.resolve_repo_section(reference, data).await
    }

    /// Decorate a repo node and resolve its includes.
    async fn resolve_repo_section(&mut self, reference: Reference, mut data: Tree) -> Result<RepoNode> {
        let entries: Vec<IncludeEntry> = take_section(&mut data, INCLUDE_KEY)
            .with_context(|| format!("Invalid repo include list in {reference}"))?
            .unwrap_or_default();
        repo::absolutize(&mut data, &reference.url)?;

        let mut errors = ErrorSet::default();
        let mut children = Vec::with_capacity(entries.len());

        for entry in &entries {
            let Some(child) = errors.collect(entry.to_reference(&reference.url).map_err(Into::into))
            else {
                continue;
            };
            if !self.seen_repos.insert(child.identity().to_string()) {
                tracing::warn!("Skipping already included repo {} (from {})", child, reference);
                continue;
            }
            let resolved = Box::pin(self.resolve_repo_document(child.clone()))
                .await
                .with_context(|| format!("Failed to resolve repo include {child}"));
            if let Some(node) = errors.collect(resolved) {
                children.push(node);
            }
        }

        errors.finish()?;

        Ok(RepoNode {
            reference,
            data,
            children,
        })
    }
}
