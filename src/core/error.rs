//! Error handling for stackctl
//!
//! Every failure the resolution run can produce is described by [`StackError`].
//! Lower layers return `anyhow::Result` with a [`StackError`] at the root so that
//! callers can classify a failure with `downcast_ref::<StackError>()` while still
//! attaching context on the way up.
//!
//! Two extra pieces sit on top of the enum:
//! - [`MultiError`] collects failures from sibling operations (several includes,
//!   several services) so that every sibling is attempted before the run aborts.
//! - [`ErrorContext`] / [`user_friendly_error`] turn the final error into a
//!   coloured message with details and a suggestion for the CLI.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackctl::core::{StackError, user_friendly_error};
//!
//! let err = anyhow::Error::from(StackError::UnknownFormat {
//!     extension: "ini".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The error kinds produced while resolving, merging, rendering and building.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    /// A remote resource could not be downloaded.
    ///
    /// Raised on transport failures and on any non-2xx HTTP status.
    #[error("Failed to fetch {url}: {reason}")]
    FetchError {
        /// The URL that was requested
        url: String,
        /// Transport error or HTTP status
        reason: String,
    },

    /// A downloaded resource does not match its published SHA-256.
    ///
    /// The downloaded file is left at `path`; it must not be trusted.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Local path of the downloaded file
        path: String,
        /// Checksum read from the `.sha256` resource
        expected: String,
        /// Checksum computed from the downloaded bytes
        actual: String,
    },

    /// A document could not be decoded.
    #[error("Failed to parse {path}: {reason}")]
    ParseError {
        /// Path of the document
        path: String,
        /// Decoder message
        reason: String,
    },

    /// The file extension does not map to a supported document format.
    #[error("Unknown document format '{extension}'")]
    UnknownFormat {
        /// The offending extension (may be empty)
        extension: String,
    },

    /// A key path segment is absent from a tree.
    ///
    /// Callers commonly treat this as "optional, skip".
    #[error("Missing key '{key}'")]
    MissingKey {
        /// Dotted key path that was requested
        key: String,
    },

    /// A value exists but cannot be read as the requested shape.
    #[error("Type mismatch at '{key}': {reason}")]
    TypeMismatch {
        /// Dotted key path that was requested
        key: String,
        /// Deserializer message
        reason: String,
    },

    /// Two sources disagree on the shape of the value at a key path.
    #[error("Merge conflict at '{path}': {reason}")]
    MergeConflict {
        /// Dotted key path of the conflict
        path: String,
        /// Description of the two shapes
        reason: String,
    },

    /// A service references a globals block that does not exist.
    #[error("Service '{service}' references undefined global '{global}'")]
    UndefinedGlobal {
        /// The service declaring the reference
        service: String,
        /// The missing globals block
        global: String,
    },

    /// Rendering a template or re-parsing its output failed.
    #[error("Template error in {name}: {message}")]
    TemplateError {
        /// Service name or file path being rendered
        name: String,
        /// Renderer or parser message
        message: String,
    },

    /// Build commands finished but the expected binary is not there.
    #[error("Build finished but binary {binary} does not exist")]
    BuildIncomplete {
        /// Expected binary path
        binary: String,
    },

    /// A build command exited unsuccessfully or could not be started.
    #[error("Build command '{command}' failed: {reason}")]
    BuildCommandFailed {
        /// The rendered command line
        command: String,
        /// Exit status or spawn error
        reason: String,
    },

    /// The run-scoped deadline expired.
    #[error("{operation} cancelled after {seconds}s")]
    Cancelled {
        /// What was running when the deadline expired
        operation: String,
        /// Deadline in seconds
        seconds: u64,
    },

    /// A reference string could not be turned into an absolute URL.
    #[error("Invalid reference '{reference}': {reason}")]
    InvalidReference {
        /// The raw reference
        reference: String,
        /// Why it was rejected
        reason: String,
    },

    /// Git is not installed or not in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// A git command returned a non-zero exit code.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation (clone, pull, ...)
        operation: String,
        /// stderr of the command
        stderr: String,
    },

    /// Cloning a source repository failed.
    #[error("Failed to clone repository: {url}")]
    GitCloneFailed {
        /// The source URL
        url: String,
        /// stderr of the clone
        reason: String,
    },

    /// No binary distribution or buildable source exists for this platform.
    #[error("{name} has no binary or source for platform {platform}")]
    PlatformNotSupported {
        /// Component name
        name: String,
        /// `<os>_<arch>` key that was looked up
        platform: String,
    },

    /// A named operator, tool or service is not declared in the repo tree.
    #[error("{kind} '{name}' is not declared in any repo")]
    ComponentNotFound {
        /// operator, tool or service
        kind: String,
        /// The requested name
        name: String,
    },
}

impl StackError {
    /// Whether this is the "key absent" flavour of an extraction failure.
    #[must_use]
    pub const fn is_missing_key(&self) -> bool {
        matches!(self, Self::MissingKey { .. })
    }
}

/// Several sibling failures surfaced together.
///
/// Built through [`ErrorSet`]; a single failure is never wrapped.
#[derive(Debug)]
pub struct MultiError {
    errors: Vec<anyhow::Error>,
}

impl MultiError {
    /// The collected failures, in the order they occurred.
    #[must_use]
    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error:#}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Accumulates failures while iterating over siblings.
///
/// ```rust
/// use stackctl::core::ErrorSet;
///
/// let mut errors = ErrorSet::default();
/// for item in ["a", "b"] {
///     if item == "b" {
///         errors.push(anyhow::anyhow!("bad item {item}"));
///     }
/// }
/// assert!(errors.finish().is_err());
/// ```
#[derive(Debug, Default)]
pub struct ErrorSet {
    errors: Vec<anyhow::Error>,
}

impl ErrorSet {
    /// Record a failure.
    pub fn push(&mut self, error: anyhow::Error) {
        self.errors.push(error);
    }

    /// Record the error of `result`, if any, and return its value.
    pub fn collect<T>(&mut self, result: anyhow::Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.push(e);
                None
            }
        }
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Ok when nothing failed, the sole error when one did, a [`MultiError`] otherwise.
    pub fn finish(mut self) -> anyhow::Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(MultiError {
                errors: self.errors,
            }
            .into()),
        }
    }
}

/// An error with optional user-facing details and suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: anyhow::Error,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error with no details or suggestion.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add an actionable suggestion, shown in green.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details, shown in yellow.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // A classified error leads with its own message; the rest of the chain
    // goes to the details.
    fn headline(&self) -> String {
        match self.error.downcast_ref::<StackError>() {
            Some(stack_error) => stack_error.to_string(),
            None => format!("{:#}", self.error),
        }
    }

    /// Print to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.headline());

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.headline())?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// The context chain of `error` is kept as details so that the user sees which
/// document or service the failure belongs to.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if error.downcast_ref::<MultiError>().is_some() {
        return ErrorContext::new(error)
            .with_suggestion("Fix every listed failure; siblings are reported together");
    }

    if let Some(stack_error) = error.downcast_ref::<StackError>() {
        let chain = format!("{error:#}");
        let headline = stack_error.to_string();
        let (details, suggestion) = advice(stack_error);

        let mut ctx = ErrorContext::new(error);
        ctx.details = if chain == headline { details } else { Some(chain) };
        ctx.suggestion = suggestion;
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        let suggestion = match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => "Check file ownership and permissions",
            std::io::ErrorKind::NotFound => "Check that the path exists",
            _ => "Check the filesystem and try again",
        };
        return ErrorContext::new(error).with_suggestion(suggestion);
    }

    ErrorContext::new(error)
}

/// Details and suggestion known for a kind of failure.
fn advice(error: &StackError) -> (Option<String>, Option<String>) {
    let suggestion = |text: &str| (None, Some(text.to_string()));
    match error {
        StackError::FetchError { .. } => suggestion("Check the URL and your network connection"),
        StackError::ChecksumMismatch { path, .. } => (
            Some("The downloaded file does not match its published .sha256".to_string()),
            Some(format!("Remove {path} or run with --clear-cache, then retry")),
        ),
        StackError::UnknownFormat { .. } => {
            suggestion("Use a .json, .yaml, .yml or .toml document")
        }
        StackError::UndefinedGlobal { .. } => {
            suggestion("Define the block under the top-level 'globals' section")
        }
        StackError::GitNotFound => {
            suggestion("Install git from https://git-scm.com/ and make sure it is in PATH")
        }
        StackError::Cancelled { .. } => {
            suggestion("Raise the limit with --timeout or pass --timeout 0 to disable it")
        }
        StackError::BuildIncomplete { .. } => {
            suggestion("Check that the build commands write the binary the source declares")
        }
        _ => (None, None),
    }
}
