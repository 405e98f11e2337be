//! Document decoding and encoding.
//!
//! Every configuration document, whatever its on-disk format, is decoded into
//! a [`serde_json::Value`] tree. The tagged variants (null, bool, number,
//! string, sequence, mapping) are all downstream stages ever see; typed views
//! are pulled out with [`extract`](extract::extract).
//!
//! The format is chosen from the file extension alone:
//!
//! | Extension | Format |
//! |---|---|
//! | `.json` | [`Format::Json`] |
//! | `.yaml`, `.yml` | [`Format::Yaml`] |
//! | `.toml` | [`Format::Toml`] |
//!
//! Anything else fails with [`StackError::UnknownFormat`].

pub mod extract;
pub mod reference;

use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::core::StackError;

pub use extract::{extract, extract_optional, lookup, take_section};
pub use reference::{IncludeEntry, Reference, resolve_reference, root_url};

/// A decoded document's top-level mapping.
pub type Tree = serde_json::Map<String, Value>;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// JSON
    Json,
    /// YAML
    #[default]
    Yaml,
    /// TOML
    Toml,
}

impl Format {
    /// Pick a format from a bare extension (without the dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Pick a format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, StackError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| StackError::UnknownFormat {
            extension: ext.to_string(),
        })
    }

    /// Canonical extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| StackError::UnknownFormat {
            extension: s.to_string(),
        })
    }
}

/// Decode `text` in `format`. `origin` names the source in error messages.
pub fn decode(text: &str, format: Format, origin: &str) -> Result<Value, StackError> {
    let parse_error = |reason: String| StackError::ParseError {
        path: origin.to_string(),
        reason,
    };

    match format {
        Format::Json => serde_json::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Yaml => serde_yaml::from_str(text).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(text).map_err(|e| parse_error(e.to_string())),
    }
}

/// Decode `text` and require a mapping at the top level.
///
/// An empty document (YAML `null`) decodes to an empty mapping.
pub fn decode_tree(text: &str, format: Format, origin: &str) -> Result<Tree, StackError> {
    match decode(text, format, origin)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Tree::new()),
        other => Err(StackError::ParseError {
            path: origin.to_string(),
            reason: format!("expected a mapping at the top level, found {}", kind_name(&other)),
        }),
    }
}

/// Read and decode the document at `path`.
pub async fn read_document(path: &Path) -> Result<Tree> {
    let format = Format::from_path(path)?;
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let tree = decode_tree(&text, format, &path.display().to_string())?;
    tracing::trace!("Decoded {} as {}", path.display(), format);
    Ok(tree)
}

/// Serialize `value` in `format`.
pub fn encode(value: &Value, format: Format) -> Result<String> {
    let text = match format {
        Format::Json => {
            let mut s = serde_json::to_string_pretty(value)?;
            s.push('\n');
            s
        }
        Format::Yaml => serde_yaml::to_string(value)?,
        Format::Toml => toml::to_string_pretty(value)
            .context("TOML cannot represent this document (null values are not allowed)")?,
    };
    Ok(text)
}

/// Human name of a value's variant, for error messages.
#[must_use]
pub const fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
