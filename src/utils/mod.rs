//! Cross-cutting helpers for filesystem access and platform detection.

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, cache_key, ensure_dir, sha256_hex};
pub use platform::{arch_name, os_name, platform_key};
