//! The configuration run
//!
//! A [`Config`] owns everything one invocation needs: the root documents, the
//! project identity, the cache namespace and, after [`Config::resolve`], the
//! final tree. The run is:
//!
//! 1. resolve the include and repo graphs of every root ([`crate::resolver`]);
//! 2. merge the documents in priority order, built-in defaults last;
//! 3. merge the repo forest in priority order into the typed [`RepoTree`]
//!    and store it under `repos`;
//! 4. apply globals ([`globals::apply_globals`]);
//! 5. fetch and render file entries ([`crate::templating::render_files`]);
//! 6. render service definitions ([`crate::templating::render_services`]).
//!
//! Steps 1 to 6 share one deadline. The finished tree is read-only for
//! consumers and can be serialized to any supported [`Format`].
//!
//! ```rust,no_run
//! use stackctl::config::{Config, RunSettings};
//! use stackctl::document::Format;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = Config::load(&["stack.yaml".to_string()], RunSettings::default()).await?;
//! config.resolve().await?;
//! println!("{}", config.to_format(Format::Yaml)?);
//! # Ok(())
//! # }
//! ```

pub mod globals;
pub mod settings;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::cache::Cache;
use crate::cache::download::{fetch_text, http_client};
use crate::constants::{PROJECT_ID_LEN, REPOS_KEY, TOOL_KEY};
use crate::core::Deadline;
use crate::document::reference::extension;
use crate::document::{Format, Tree, decode_tree, encode, extract_optional, read_document, root_url};
use crate::merge::merge_tree;
use crate::resolver::{DocumentNode, Node, RepoTree, Resolver};
use crate::templating::{build_context, render_files, render_services};
use crate::utils::fs::atomic_write;

pub use globals::apply_globals;
pub use settings::{RunSettings, get_cache_dir};

/// The top-level `stackctl` section of the merged tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSection {
    /// Operator that consumes the final tree
    #[serde(default)]
    pub operator: Option<String>,
    /// Extra arguments for the operator
    #[serde(default)]
    pub command: Vec<String>,
}

/// One resolution run.
#[derive(Debug)]
pub struct Config {
    roots: Vec<Url>,
    project_id: String,
    cache: Cache,
    settings: RunSettings,
    defaults: Tree,
    documents: Vec<DocumentNode>,
    repos: RepoTree,
    tree: Tree,
}

impl Config {
    /// Normalize `paths`, determine the project identity and open its cache.
    ///
    /// Nothing remote is fetched yet.
    pub async fn load(paths: &[String], settings: RunSettings) -> Result<Self> {
        let mut roots: Vec<Url> = Vec::with_capacity(paths.len());
        for raw in paths {
            let url = root_url(raw)?;
            if roots.contains(&url) {
                tracing::warn!("Config {} given more than once, ignoring the repeat", url);
                continue;
            }
            roots.push(url);
        }

        let client = http_client()?;
        let project_id = project_identity(&roots, &client, settings.deadline()).await;
        tracing::debug!("Project identity: {}", project_id);

        let cache = Cache::with_dir(settings.cache_root()?.join(&project_id))?;
        if settings.clear_cache {
            cache.clear().await?;
        }

        Ok(Self {
            roots,
            project_id,
            cache,
            settings,
            defaults: Tree::new(),
            documents: Vec::new(),
            repos: RepoTree::default(),
            tree: Tree::new(),
        })
    }

    /// Merge `defaults` below every document.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Tree) -> Self {
        self.defaults = defaults;
        self
    }

    /// Run the whole pipeline under the run deadline.
    pub async fn resolve(&mut self) -> Result<()> {
        let deadline = self.settings.deadline();
        let cache = self.cache.clone().with_deadline(deadline);
        deadline.run("configuration resolution", self.run_pipeline(&cache)).await
    }

    async fn run_pipeline(&mut self, cache: &Cache) -> Result<()> {
        let mut resolver = Resolver::new(cache);
        self.documents = resolver.resolve_roots(&self.roots).await?;

        let mut tree = Tree::new();
        for document in self.documents.iter().flat_map(|root| root.flatten()) {
            merge_tree(&mut tree, &document.data)
                .with_context(|| format!("Failed to merge {}", document.reference))?;
        }
        merge_tree(&mut tree, &self.defaults).context("Failed to merge built-in defaults")?;

        let mut repos = Tree::new();
        for repo in self.documents.iter().flat_map(|root| root.flatten_repos()) {
            merge_tree(&mut repos, &repo.data)
                .with_context(|| format!("Failed to merge repo {}", repo.reference))?;
        }
        self.repos = RepoTree::from_value(Value::Object(repos))?;
        self.store_repos(&mut tree)?;

        apply_globals(&mut tree)?;

        let context = build_context(&tree, &self.project_id)?;
        render_files(&mut self.repos, cache, &context).await?;
        self.store_repos(&mut tree)?;

        let context = build_context(&tree, &self.project_id)?;
        render_services(&mut tree, &context)?;

        self.tree = tree;
        Ok(())
    }

    fn store_repos(&self, tree: &mut Tree) -> Result<()> {
        if self.repos.is_empty() {
            tree.remove(REPOS_KEY);
        } else {
            tree.insert(REPOS_KEY.to_string(), self.repos.to_value()?);
        }
        Ok(())
    }

    /// Normalized root URLs, in priority order.
    #[must_use]
    pub fn roots(&self) -> &[Url] {
        &self.roots
    }

    /// Project identity namespacing the cache.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Cache namespace of this project.
    #[must_use]
    pub const fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Run settings.
    #[must_use]
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Resolved root documents with their include and repo graphs.
    #[must_use]
    pub fn documents(&self) -> &[DocumentNode] {
        &self.documents
    }

    /// Typed view of the merged repo tree.
    #[must_use]
    pub const fn repos(&self) -> &RepoTree {
        &self.repos
    }

    /// The final tree.
    #[must_use]
    pub const fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Variable context over the final tree, for the build pipeline.
    pub fn template_context(&self) -> Result<tera::Context> {
        Ok(build_context(&self.tree, &self.project_id)?)
    }

    /// The `stackctl` section, empty when absent.
    pub fn tool_section(&self) -> Result<ToolSection> {
        let root = Value::Object(self.tree.clone());
        Ok(extract_optional(&root, &[TOOL_KEY])?.unwrap_or_default())
    }

    /// Serialize the final tree.
    pub fn to_format(&self, format: Format) -> Result<String> {
        encode(&Value::Object(self.tree.clone()), format)
    }

    /// Write the final tree to `path`, format chosen by extension.
    pub fn write(&self, path: &Path) -> Result<()> {
        let format = Format::from_path(path)?;
        let text = self.to_format(format)?;
        atomic_write(path, text.as_bytes())
            .with_context(|| format!("Failed to write configuration to {}", path.display()))
    }
}

/// `name` of the first readable root, else a fresh random identifier.
async fn project_identity(roots: &[Url], client: &Client, deadline: Deadline) -> String {
    for url in roots {
        let data = match read_root(url, client, deadline).await {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!("Skipping {} for the project identity: {:#}", url, e);
                continue;
            }
        };
        if let Some(Value::String(name)) = data.get("name") {
            if !name.is_empty() {
                return name.clone();
            }
        }
    }

    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(PROJECT_ID_LEN);
    id
}

// The cache namespace is not known yet, so remote roots are read directly.
async fn read_root(url: &Url, client: &Client, deadline: Deadline) -> Result<Tree> {
    if let Ok(path) = url.to_file_path() {
        return read_document(&path).await;
    }
    let format: Format = extension(url).trim_start_matches('.').parse()?;
    let text = deadline.run(&format!("fetch of {url}"), fetch_text(client, url)).await?;
    Ok(decode_tree(&text, format, url.as_str())?)
}
