//! Test utilities for stackctl
//!
//! Helpers shared by unit tests and the integration suite: one-time logging
//! setup, document fixtures in temporary directories, and run settings that
//! keep the cache inside a test's own directory.
//!
//! ```rust,no_run
//! use stackctl::test_utils::{DocumentFixture, init_test_logging};
//!
//! init_test_logging(None);
//! let fixture = DocumentFixture::new().unwrap();
//! let root = fixture.write("stack.yaml", "name: demo\n").unwrap();
//! ```

use anyhow::Result;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::RunSettings;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; does nothing when neither
/// is set.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// A temporary directory holding configuration documents and a private cache.
pub struct DocumentFixture {
    temp: TempDir,
}

impl DocumentFixture {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: TempDir::new()?,
        })
    }

    /// Directory of the fixture.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Cache root used by [`Self::settings`].
    #[must_use]
    pub fn cache_root(&self) -> PathBuf {
        self.temp.path().join(".cache")
    }

    /// Write `content` to `name` (parents created) and return its path as a string.
    pub fn write(&self, name: &str, content: &str) -> Result<String> {
        let path = self.temp.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path.display().to_string())
    }

    /// `file://` URL of `name` inside the fixture.
    pub fn url(&self, name: &str) -> Result<String> {
        let path = self.temp.path().join(name);
        Url::from_file_path(&path)
            .map(|u| u.to_string())
            .map_err(|()| anyhow::anyhow!("not an absolute path: {}", path.display()))
    }

    /// Settings with a short timeout and the cache inside the fixture.
    #[must_use]
    pub fn settings(&self) -> RunSettings {
        RunSettings {
            timeout: Some(Duration::from_secs(20)),
            clear_cache: false,
            cache_dir: Some(self.cache_root()),
        }
    }
}
