// error.rs — Error types for agent sessions.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by an agent invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not be launched, exited non-zero, reported an
    /// error, or ran past its timeout.
    #[error("agent execution failed: {message}")]
    ExecutionFailed {
        message: String,
        /// Whether calling again may succeed (rate limits, overload).
        retryable: bool,
        /// Suggested wait before calling again.
        retry_after: Option<Duration>,
    },

    /// The session handle is unknown or the agent cannot resume it.
    #[error("session '{0}' cannot be continued")]
    SessionNotContinuable(String),

    /// A file I/O operation failed (session store).
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize session data.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AgentError {
    /// A non-retryable execution failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        AgentError::ExecutionFailed {
            message: message.into(),
            retryable: false,
            retry_after: None,
        }
    }

    /// A retryable execution failure with an optional backoff hint.
    pub fn transient(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        AgentError::ExecutionFailed {
            message: message.into(),
            retryable: true,
            retry_after,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AgentError::ExecutionFailed { retryable: true, .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AgentError::ExecutionFailed { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
