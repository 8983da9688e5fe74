//! Error types for the unit test harness
//!
//! Fixture setup problems are fatal to the calling test, so nothing here is
//! retried. Cleanup and restore failures are aggregated rather than
//! short-circuited so that one bad handle never hides another.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Unified error type for harness operations
#[derive(Debug, thiserror::Error)]
pub enum TestkitError {
    /// Temp space, inodes or file descriptors are unavailable
    #[error("Resource exhaustion: {message}")]
    ResourceExhaustion {
        /// Error message describing the exhausted resource
        message: String,
    },

    /// The temp directory (or sandbox root) is not writable
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Error message describing the permission issue
        message: String,
    },

    /// Any other filesystem failure
    #[error("I/O error: {message}")]
    Io {
        /// Error message describing the failure
        message: String,
    },

    /// An override named a variable the host cannot represent
    #[error("Invalid environment variable {name:?}: {reason}")]
    InvalidVariable {
        /// Offending variable name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// One or more variables could not be reverted to their prior state
    #[error("Failed to restore {} environment variable(s): {}", .failures.len(), join(.failures))]
    RestoreFailure {
        /// Every key that failed to restore
        failures: Vec<RestoreFailure>,
    },

    /// One or more retained temp files could not be removed at run end
    #[error("Failed to clean up {} temp file(s): {}", .failures.len(), join(.failures))]
    Cleanup {
        /// Every handle that failed to release
        failures: Vec<CleanupFailure>,
    },

    /// A temp file was tracked outside of `begin_run`/`end_run`
    #[error("No active test run")]
    NoActiveRun,

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl TestkitError {
    /// Create a resource exhaustion error
    pub fn resource_exhaustion(message: impl Into<String>) -> Self {
        Self::ResourceExhaustion {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a generic I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create an invalid variable error
    pub fn invalid_variable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVariable {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Classify an I/O error raised while allocating a fixture resource
    ///
    /// Out-of-space and descriptor exhaustion map to `ResourceExhaustion`,
    /// access failures map to `PermissionDenied`, everything else to `Io`.
    pub fn from_io(err: &io::Error, context: impl fmt::Display) -> Self {
        let message = format!("{context}: {err}");
        if err.kind() == io::ErrorKind::PermissionDenied {
            Self::permission_denied(message)
        } else if is_exhaustion(err) {
            Self::resource_exhaustion(message)
        } else {
            Self::io(message)
        }
    }

    /// True for fixture-creation errors that indicate the host ran out of something
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(self, Self::ResourceExhaustion { .. })
    }

    /// True for fixture-creation errors caused by missing write access
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// Standard Result type for harness operations
pub type Result<T> = std::result::Result<T, TestkitError>;

/// A single variable that could not be put back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFailure {
    /// Variable name
    pub key: String,
    /// What went wrong
    pub reason: String,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

/// A single temp file that could not be released
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    /// Path of the file
    pub path: PathBuf,
    /// Underlying error text
    pub reason: String,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Failure of a scoped call whose action is itself fallible
///
/// The action's own error is always primary. A restore failure that happens
/// after a failed action is attached rather than substituted.
#[derive(Debug, thiserror::Error)]
pub enum ScopedError<E> {
    /// Overrides were rejected before anything was mutated
    #[error("Environment setup failed: {0}")]
    Setup(#[source] TestkitError),

    /// The wrapped action failed
    #[error("{source}")]
    Action {
        /// The action's error, unchanged
        source: E,
        /// Restore failure observed after the action failed, if any
        restore: Option<TestkitError>,
    },

    /// The action succeeded but the environment could not be reverted
    #[error("Environment restore failed: {0}")]
    Restore(#[source] TestkitError),
}

impl<E> ScopedError<E> {
    /// The action's error, if that is what this failure is
    pub fn action_error(&self) -> Option<&E> {
        match self {
            Self::Action { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Consume and return the action's error, if any
    pub fn into_action_error(self) -> Option<E> {
        match self {
            Self::Action { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Any restore failure observed, whether primary or attached
    pub fn restore_error(&self) -> Option<&TestkitError> {
        match self {
            Self::Action { restore, .. } => restore.as_ref(),
            Self::Restore(err) => Some(err),
            Self::Setup(_) => None,
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(unix)]
fn is_exhaustion(err: &io::Error) -> bool {
    // ENFILE, EMFILE, ENOSPC, and EDQUOT on Linux
    const CODES: &[i32] = &[23, 24, 28, 122];
    err.kind() == io::ErrorKind::OutOfMemory
        || err.raw_os_error().is_some_and(|code| CODES.contains(&code))
}

#[cfg(windows)]
fn is_exhaustion(err: &io::Error) -> bool {
    // ERROR_TOO_MANY_OPEN_FILES, ERROR_HANDLE_DISK_FULL, ERROR_DISK_FULL
    const CODES: &[i32] = &[4, 39, 112];
    err.kind() == io::ErrorKind::OutOfMemory
        || err.raw_os_error().is_some_and(|code| CODES.contains(&code))
}

#[cfg(not(any(unix, windows)))]
fn is_exhaustion(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::OutOfMemory
}
