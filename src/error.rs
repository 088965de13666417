//! Domain-specific error types for the installer.
//!
//! Internal modules return [`anyhow::Result`] and raise the typed variants of
//! [`InstallError`] where a failure belongs to a known category.  The install
//! driver is the single place that turns any error into a failed outcome.
//!
//! # Error taxonomy
//!
//! ```text
//! InstallError
//! ├── input:     SourceNotFound, UnknownUser, UnknownGroup, InvalidMode,
//! │              InvalidRemoteSyntax
//! └── transport: Transport, ToolNotFound
//! ```
//!
//! Filesystem failures are plain [`std::io::Error`]s wrapped with path
//! context by the caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that terminate a single install invocation.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The source path does not exist or is not a regular file.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The owner name is not present in the user database.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// The group name is not present in the group database.
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    /// The mode argument is not a base-8 number within `0..=0o7777`.
    #[error("Invalid octal mode '{0}': expected a value such as 0644")]
    InvalidMode(String),

    /// A remote destination is missing its host or its path.
    #[error("Invalid remote destination syntax: {0}")]
    InvalidRemoteSyntax(String),

    /// A secure-shell operation exited non-zero or could not be started.
    #[error("{operation} failed for {destination}: {detail}")]
    Transport {
        /// What was being attempted (e.g. `"upload"`).
        operation: String,
        /// The `user@host:path` the operation addressed.
        destination: String,
        /// Captured standard error or spawn failure.
        detail: String,
    },

    /// A required external program is not on `PATH`.
    #[error("Required program '{0}' not found on PATH")]
    ToolNotFound(String),
}

impl InstallError {
    /// Return `true` for errors caused by the caller's arguments rather than
    /// the environment.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_)
                | Self::UnknownUser(_)
                | Self::UnknownGroup(_)
                | Self::InvalidMode(_)
                | Self::InvalidRemoteSyntax(_)
        )
    }
}
