//! Common test utilities for stackctl integration tests

// Not every helper is used by every test file
#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::Command;
use std::path::Path;

use stackctl::config::Config;
use stackctl::test_utils::{DocumentFixture, init_test_logging};

/// A directory of configuration documents with its own cache root.
pub struct TestProject {
    fixture: DocumentFixture,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        init_test_logging(None);
        Ok(Self {
            fixture: DocumentFixture::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.fixture.path()
    }

    pub fn cache_root(&self) -> std::path::PathBuf {
        self.fixture.cache_root()
    }

    /// Write a document and return its path.
    pub fn write(&self, name: &str, content: &str) -> Result<String> {
        self.fixture.write(name, content)
    }

    /// `file://` URL of a document in the project.
    pub fn url(&self, name: &str) -> Result<String> {
        self.fixture.url(name)
    }

    /// Load the given roots without resolving.
    pub async fn load(&self, roots: &[String]) -> Result<Config> {
        Config::load(roots, self.fixture.settings()).await
    }

    /// Load and resolve the given roots.
    pub async fn resolve(&self, roots: &[String]) -> Result<Config> {
        let mut config = self.load(roots).await?;
        config.resolve().await?;
        Ok(config)
    }

    /// The stackctl binary, run inside the project with its cache isolated.
    pub fn stackctl(&self) -> Command {
        let mut cmd = Command::cargo_bin("stackctl").expect("stackctl binary is built");
        cmd.current_dir(self.path())
            .env("STACKCTL_CACHE_DIR", self.cache_root())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("STACKCTL_TIMEOUT");
        cmd
    }
}
