//! Platform names and executable lookup.
//!
//! Binary distributions are keyed `<os>_<arch>` using the naming most release
//! pipelines publish under (`linux_amd64`, `darwin_arm64`, ...). The same names
//! are exposed to templates as `OS` and `ARCH`.

use anyhow::Result;

use crate::core::StackError;

/// Whether the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Operating system name as used in distribution keys.
#[must_use]
pub fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// CPU architecture name as used in distribution keys.
#[must_use]
pub fn arch_name() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// `<os>_<arch>` key for the running platform.
#[must_use]
pub fn platform_key() -> String {
    format!("{}_{}", os_name(), arch_name())
}

/// Name of the git executable for this platform.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() { "git.exe" } else { "git" }
}

/// Fail with [`StackError::GitNotFound`] unless git is on PATH.
pub fn ensure_git_available() -> Result<()> {
    if which::which(get_git_command()).is_err() {
        return Err(StackError::GitNotFound.into());
    }
    Ok(())
}
