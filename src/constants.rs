//! Names shared across modules: cache categories, reserved document keys,
//! environment variables and defaults.

use std::time::Duration;

/// Directory under the user cache root that holds every project namespace.
pub const CACHE_ROOT_DIR: &str = "stackctl";

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "STACKCTL_CACHE_DIR";

/// Suffix of the checksum sidecar written next to a cached resource.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Suffix appended to a resource URL to locate its detached signature.
pub const SIGNATURE_SUFFIX: &str = ".asc";

/// Top-level key listing included documents.
pub const INCLUDE_KEY: &str = "include";

/// Top-level key holding a document's repo node and, after merging, the repo tree.
pub const REPOS_KEY: &str = "repos";

/// Top-level key holding named globals blocks.
pub const GLOBALS_KEY: &str = "globals";

/// Top-level key holding per-service configuration blocks.
pub const CONFIGS_KEY: &str = "configs";

/// Top-level key holding service definitions.
pub const SERVICES_KEY: &str = "services";

/// Key, inside a service definition and at top level, for tool settings.
pub const TOOL_KEY: &str = "stackctl";

/// Number of bytes of the SHA-256 digest used in cache file names.
pub const CACHE_KEY_BYTES: usize = 16;

/// Length of a generated project identity.
pub const PROJECT_ID_LEN: usize = 12;

/// Default run deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout of a single git command.
pub const GIT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);
