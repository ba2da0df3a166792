// error.rs — Error types for the tracker subsystem.

use thiserror::Error;

/// Errors that can occur while talking to a task tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracker could not be reached or returned an unusable response.
    #[error("failed to fetch issue {id}: {reason}")]
    FetchFailed { id: String, reason: String },

    /// The tracker has no issue with this identifier.
    #[error("issue not found: {0}")]
    NotFound(String),

    /// The requested status does not exist for this tracker/issue.
    #[error("status '{requested}' is not available (available: {})", .available.join(", "))]
    InvalidStatus {
        requested: String,
        available: Vec<String>,
    },

    /// Writing to the tracker (status, comment, link) failed.
    #[error("failed to update issue {id}: {reason}")]
    UpdateFailed { id: String, reason: String },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize ticket data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TrackerError {
    /// Whether this error is the "status doesn't exist" case.
    ///
    /// Status transitions treat every error as non-fatal, but this subset is
    /// expected (trackers name their workflow states differently) and is
    /// reported more quietly than transport failures.
    pub fn is_advisory_status_error(&self) -> bool {
        matches!(self, TrackerError::InvalidStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
