//! Integration test suite for stackctl
//!
//! End-to-end tests of complete resolution runs and of the CLI.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolution**: include and repo graphs, priority order, failures
//! - **cache**: HTTP fetches, cache hits, checksum verification
//! - **templating**: globals, file entries and service rendering
//! - **build**: operator binaries from distributions and local sources
//! - **cli**: the `stackctl` binary

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod build;
mod cache;
mod cli;
mod resolution;
mod templating;
