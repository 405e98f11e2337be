//! stackctl: layered service-stack configuration
//!
//! stackctl takes one or more configuration documents (local paths or
//! `http(s)`/`file` URLs), follows their `include` and `repos` references,
//! and produces a single tree that an operator consumes to bring a stack of
//! services up. Along the way it:
//!
//! - downloads and caches remote documents, verifying `.sha256` sidecars;
//! - merges documents in priority order (earlier wins, sequences append);
//! - expands per-service `globals` into service configs;
//! - fetches and renders file entries and service definitions as templates;
//! - resolves operator and tool binaries from published distributions or by
//!   building their sources.
//!
//! # Modules
//!
//! - [`document`]: document formats, references and key extraction
//! - [`cache`]: per-project download cache
//! - [`resolver`]: include and repo graph resolution
//! - [`merge`]: the tree merge rules
//! - [`config`]: a complete resolution run and its settings
//! - [`templating`]: variable context and rendering
//! - [`build`] and [`git`]: binaries for operators and tools
//! - [`core`]: errors and the run deadline
//!
//! # Example
//!
//! ```rust,no_run
//! use stackctl::config::{Config, RunSettings};
//! use stackctl::document::Format;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut config = Config::load(
//!     &["stack.yaml".to_string(), "https://example.com/base.yaml".to_string()],
//!     RunSettings::default(),
//! )
//! .await?;
//! config.resolve().await?;
//! print!("{}", config.to_format(Format::Json)?);
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod document;
pub mod merge;
pub mod resolver;
pub mod templating;

// Binaries for operators and tools
pub mod build;
pub mod git;

// Supporting modules
pub mod constants;
pub mod utils;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
