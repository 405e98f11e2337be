//! Repo documents and the typed repo tree.
//!
//! A repo document declares where the pieces of a stack come from: operators,
//! tools and services (each with per-platform binary distributions and/or a
//! buildable source), plus data files that services need at runtime. Repo
//! documents link to further repo documents through their own `include` list,
//! a link space independent from the configuration include graph.
//!
//! Repo nodes keep their data as an untyped tree so that merging follows the
//! same rules as every other document. [`RepoTree`] is the typed view of the
//! merged result.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Node;
use crate::core::StackError;
use crate::document::{Reference, Tree, resolve_reference};

/// One resolved repo document.
#[derive(Debug, Clone)]
pub struct RepoNode {
    /// Where the repo node was declared
    pub reference: Reference,
    /// Decoded and decorated data, `include` removed
    pub data: Tree,
    /// Repo documents included by this one, in declaration order
    pub children: Vec<RepoNode>,
}

impl Node for RepoNode {
    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// Binary published for one `<os>_<arch>` platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryDist {
    /// Download location
    pub url: String,
    /// Location of the hex SHA-256 of the download
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_url: Option<String>,
    /// Name of the binary, when it differs from the download's file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

/// A source tree that can be built into a binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Git remote to clone when no local path is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Older spelling of `repo`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Branch or tag; `refs/heads/` and `refs/tags/` prefixes are accepted
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Build commands, each a template rendered before running
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_cmds: Vec<String>,
    /// Binary path relative to the build directory, a template
    #[serde(default)]
    pub binary: String,
    /// Local checkout used instead of cloning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

impl Source {
    /// Git remote to clone, `repo` taking precedence over `url`.
    #[must_use]
    pub fn remote(&self) -> Option<&str> {
        self.repo.as_deref().or(self.url.as_deref())
    }
}

/// How to obtain a component as a native binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baremetal {
    /// Distributions keyed `<os>_<arch>`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub binary: BTreeMap<String, BinaryDist>,
    /// Buildable source, used when no distribution matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

/// Image build instructions for a docker component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerBuild {
    /// Git remote holding the Dockerfile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Branch or tag
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Dockerfile path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    /// Build context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// How to obtain a component as a container image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Docker {
    /// Image registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// Image name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Image tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Entrypoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    /// Local build instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<DockerBuild>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

/// A tool or service declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Native binary variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baremetal: Option<Baremetal>,
    /// Container variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<Docker>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

/// A data file a service needs at runtime.
///
/// Entries without a `url` are kept but never fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute location of the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Local path, set once the file is cached or rendered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Render the file as a template
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

/// The merged repo tree, stored under the top-level `repos` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoTree {
    /// Data files by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub files: BTreeMap<String, FileEntry>,
    /// Operators by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub operators: BTreeMap<String, Baremetal>,
    /// Tools by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, Component>,
    /// Services by name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, Component>,
    /// Keys this crate does not interpret
    #[serde(flatten)]
    pub extra: Tree,
}

impl RepoTree {
    /// Typed view of a merged repo value.
    pub fn from_value(value: Value) -> Result<Self, StackError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| StackError::TypeMismatch {
            key: crate::constants::REPOS_KEY.to_string(),
            reason: e.to_string(),
        })
    }

    /// Back to an untyped value.
    pub fn to_value(&self) -> anyhow::Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Whether nothing at all is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && self.operators.is_empty()
            && self.tools.is_empty()
            && self.services.is_empty()
            && self.extra.is_empty()
    }
}

/// Make every location inside a repo node absolute against `base`.
///
/// Covers file entry URLs, binary distribution URLs and checksum URLs, and
/// local source paths. Shapes other than the expected mappings are left for
/// [`RepoTree::from_value`] to reject.
pub fn absolutize(data: &mut Tree, base: &Url) -> Result<(), StackError> {
    if let Some(Value::Object(files)) = data.get_mut("files") {
        for entry in files.values_mut() {
            absolutize_url(entry, "url", base)?;
        }
    }

    if let Some(Value::Object(operators)) = data.get_mut("operators") {
        for operator in operators.values_mut() {
            absolutize_baremetal(operator, base)?;
        }
    }

    for section in ["tools", "services"] {
        if let Some(Value::Object(components)) = data.get_mut(section) {
            for component in components.values_mut() {
                if let Some(baremetal) = component.get_mut("baremetal") {
                    absolutize_baremetal(baremetal, base)?;
                }
            }
        }
    }

    Ok(())
}

fn absolutize_baremetal(baremetal: &mut Value, base: &Url) -> Result<(), StackError> {
    if let Some(Value::Object(dists)) = baremetal.get_mut("binary") {
        for dist in dists.values_mut() {
            absolutize_url(dist, "url", base)?;
            absolutize_url(dist, "sha256Url", base)?;
        }
    }
    if let Some(source) = baremetal.get_mut("source") {
        absolutize_path(source, "path", base)?;
    }
    Ok(())
}

fn absolutize_url(holder: &mut Value, key: &str, base: &Url) -> Result<(), StackError> {
    if let Some(Value::String(raw)) = holder.get_mut(key) {
        *raw = resolve_reference(base, raw)?.to_string();
    }
    Ok(())
}

// Source paths are filesystem paths; they only resolve when the declaring
// document is itself local.
fn absolutize_path(holder: &mut Value, key: &str, base: &Url) -> Result<(), StackError> {
    if base.scheme() != "file" {
        return Ok(());
    }
    if let Some(Value::String(raw)) = holder.get_mut(key) {
        let resolved = resolve_reference(base, raw)?;
        if let Ok(path) = resolved.to_file_path() {
            *raw = path.display().to_string();
        }
    }
    Ok(())
}
