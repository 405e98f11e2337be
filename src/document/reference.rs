//! Resource references and URL resolution.
//!
//! A [`Reference`] identifies a document or file by absolute URL. Relative
//! references found inside a document are resolved against that document's
//! own URL with RFC 3986 rules before anything is fetched, so the normalized
//! URL string is a stable identity for de-duplication and cache keys.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::constants::SIGNATURE_SUFFIX;
use crate::core::StackError;

/// An absolute resource location plus optional integrity side-resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Absolute URL of the resource
    pub url: Url,
    /// Where the hex SHA-256 of the resource is published
    pub checksum: Option<Url>,
    /// Detached signature location; recorded, never verified
    pub signature: Option<Url>,
}

impl Reference {
    /// A bare reference with no checksum or signature.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self {
            url,
            checksum: None,
            signature: None,
        }
    }

    /// Identity used by seen-sets and cache keys.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.url.as_str()
    }

    /// Whether the resource is a local file.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.url.scheme() == "file"
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// The `versions` block of an include entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSource {
    /// Format of the versions document
    #[serde(default)]
    pub format: String,
    /// Location of the versions document
    #[serde(default)]
    pub url: String,
}

/// One entry of an `include` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeEntry {
    /// Location of the included document, possibly relative
    pub url: String,
    /// Signature location; defaults to `url` + `.asc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg: Option<String>,
    /// Carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionSource>,
}

impl IncludeEntry {
    /// Resolve the entry against the URL of the document that declared it.
    pub fn to_reference(&self, base: &Url) -> Result<Reference, StackError> {
        let url = resolve_reference(base, &self.url)?;
        let signature = match &self.gpg {
            Some(gpg) => resolve_reference(base, gpg)?,
            None => signature_for(&url),
        };
        Ok(Reference {
            url,
            checksum: None,
            signature: Some(signature),
        })
    }
}

/// Resolve `raw` against `base`. Absolute URLs are returned as they are.
pub fn resolve_reference(base: &Url, raw: &str) -> Result<Url, StackError> {
    base.join(raw).map_err(|e| StackError::InvalidReference {
        reference: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Default signature location: the resource path with `.asc` appended.
#[must_use]
pub fn signature_for(url: &Url) -> Url {
    let mut signature = url.clone();
    let path = format!("{}{}", url.path(), SIGNATURE_SUFFIX);
    signature.set_path(&path);
    signature
}

/// Last path segment of a URL, if any.
#[must_use]
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments().and_then(|mut s| s.next_back()).filter(|s| !s.is_empty())
}

/// Extension of a URL's last path segment, including the dot; empty when absent.
#[must_use]
pub fn extension(url: &Url) -> String {
    file_name(url)
        .and_then(|name| Path::new(name).extension())
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

fn has_scheme(raw: &str) -> bool {
    // Single-letter schemes are Windows drive letters.
    Url::parse(raw).is_ok_and(|u| u.scheme().len() > 1)
}

/// Normalize a root location given on the command line.
///
/// Strings with a URL scheme are kept; anything else is a filesystem path that
/// is canonicalized (symlinks resolved) and turned into a `file://` URL.
pub fn root_url(raw: &str) -> Result<Url> {
    if has_scheme(raw) {
        return Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"));
    }

    let canonical = std::fs::canonicalize(raw)
        .with_context(|| format!("Failed to resolve config path: {raw}"))?;
    Url::from_file_path(&canonical).map_err(|()| {
        StackError::InvalidReference {
            reference: raw.to_string(),
            reason: format!("{} is not an absolute path", canonical.display()),
        }
        .into()
    })
}
