// error.rs — Error types for the workspace subsystem.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The worktree or its branch could not be created.
    ///
    /// `path` is where the worktree was being created; it may hold partial
    /// state that still needs tearing down.
    #[error("failed to create workspace at {path}: {reason}")]
    CreationFailed { path: PathBuf, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}
