//! Filesystem helpers: directory creation, atomic writes, hashing and
//! permission bits.
//!
//! Everything that lands in the cache or in a user-visible output file goes
//! through [`atomic_write`] (or a `.part` file renamed into place by the
//! downloader), so a destination path is never observed half-written.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::CACHE_KEY_BYTES;

/// Create `path` and all missing parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Path of the temporary sibling used while `path` is being written.
#[must_use]
pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Write `content` to a temp file next to `path`, sync it, then rename it over `path`.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let temp_path = partial_path(path);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;
        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;
        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;
    Ok(())
}

/// Hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 of the file at `path`.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {} for checksum", path.display()))?;
    Ok(sha256_hex(&bytes))
}

/// Cache key for an identity string: the first 16 bytes of its SHA-256, hex-encoded.
#[must_use]
pub fn cache_key(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    hex::encode(&digest[..CACHE_KEY_BYTES])
}

/// Restrict `path` to an owner-executable binary (0700).
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to make {} executable", path.display()))
}

/// Windows has no executable bit.
#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parents_and_leaves_no_temp() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("a/b/out.yaml");
        atomic_write(&target, b"x: 1\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "x: 1\n");
        assert!(!partial_path(&target).exists());

        atomic_write(&target, b"x: 2\n").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "x: 2\n");
    }

    #[test]
    fn test_cache_key_is_sixteen_bytes() {
        let key = cache_key("https://example.com/a.yaml");
        assert_eq!(key.len(), 32);
        assert_eq!(key, cache_key("https://example.com/a.yaml"));
        assert_ne!(key, cache_key("https://example.com/b.yaml"));
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_sha256_file_matches_bytes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("f");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(sha256_file(&path).await.unwrap(), sha256_hex(b"hello"));
    }

    #[test]
    fn test_partial_path_keeps_directory() {
        let p = partial_path(Path::new("/x/y/file.tar.gz"));
        assert_eq!(p, Path::new("/x/y/file.tar.gz.part"));
    }

    #[cfg(unix)]
    #[test]
    fn test_make_executable_sets_mode() {
        use std::os::unix::fs::PermissionsExt;
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bin");
        fs::write(&path, b"#!/bin/sh\n").unwrap();
        make_executable(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
