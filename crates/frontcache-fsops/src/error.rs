//! # Design
//!
//! - Structured, constant-message errors for reconciliation.
//! - Context (paths, commands, fields) lives in fields, never in the message.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for reconciliation.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced while converging host state.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// Reading or writing a managed path failed.
    #[error("managed path io failed")]
    Io {
        /// Step and action, e.g. `write_if_changed.stage`.
        operation: &'static str,
        /// Managed path.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The server-file glob failed to compile.
    #[error("server file glob invalid")]
    Glob {
        /// Caller that compiled the glob.
        operation: &'static str,
        /// Offending glob.
        pattern: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// A built-in regular expression failed to compile.
    #[error("built-in pattern invalid")]
    Pattern {
        /// Pattern source.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// A plan, fact, or path was unusable.
    #[error("reconcile input invalid")]
    InvalidInput {
        /// Input that was rejected.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
        /// Rejected value, when printable.
        value: Option<String>,
    },
    /// Ownership changes need a Unix host.
    #[error("operation unsupported on this platform")]
    Unsupported {
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// The owner account could not be looked up.
    #[error("owner lookup failed")]
    UserLookup {
        /// Account name as given.
        user: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// The owner group could not be looked up.
    #[error("group lookup failed")]
    GroupLookup {
        /// Group name as given.
        group: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// A `chown` or `chmod` system call failed.
    #[error("ownership change failed")]
    Nix {
        /// Step and action, e.g. `apply_ownership.chown`.
        operation: &'static str,
        /// Path being changed.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// An external command could not be started.
    #[error("command could not be started")]
    CommandSpawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// An external command exited unsuccessfully where success is required.
    #[error("command exited unsuccessfully")]
    CommandFailed {
        /// Step the command belongs to.
        step: &'static str,
        /// Full command line.
        command: String,
        /// Exit status, absent when killed by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn glob(
        operation: &'static str,
        pattern: String,
        source: globset::Error,
    ) -> Self {
        Self::Glob {
            operation,
            pattern,
            source,
        }
    }
}
