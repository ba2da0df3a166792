// error.rs — Errors that end a pipeline.
//
// Every variant is fatal to its own pipeline only: the pipeline converts it
// into a `PipelineResult::Failure` and the scheduler keeps going. Advisory
// tracker failures never become a PipelineError; they are logged instead.

use thiserror::Error;

/// Why a pipeline failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The tracker could not return the issue.
    #[error("failed to fetch issue {id}: {reason}")]
    IssueFetchFailed { id: String, reason: String },

    /// The tracker has no such issue.
    #[error("issue not found: {0}")]
    IssueNotFound(String),

    /// The worktree or branch could not be created.
    #[error("workspace creation failed: {0}")]
    WorkspaceCreationFailed(String),

    /// The agent failed (launch, exit status, timeout) and was not retried
    /// or failed again on retry.
    #[error("agent execution failed: {0}")]
    AgentExecutionFailed(String),

    /// Tests kept failing after every permitted fix attempt, or no session
    /// handle was available to ask for a fix.
    #[error("tests still failing after {attempts} fix attempt(s)")]
    TestsExhausted { attempts: u32, last_output: String },

    /// No recognized build manifest in the workspace.
    #[error("cannot determine project type in {0}")]
    ProjectTypeUnknown(String),

    /// The test command itself could not be run.
    #[error("failed to run tests: {0}")]
    TestExecutionFailed(String),

    /// Staging, committing, or pushing the branch failed.
    #[error("commit failed: {0}")]
    CommitFailed(String),

    /// The pull request could not be opened.
    #[error("pull request creation failed: {0}")]
    PrCreationFailed(String),

    /// The pipeline task ended without reporting (it panicked).
    #[error("pipeline aborted: {0}")]
    Aborted(String),
}

impl PipelineError {
    /// Stable snake_case name of the error kind (for events and reports).
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::IssueFetchFailed { .. } => "issue_fetch_failed",
            PipelineError::IssueNotFound(_) => "issue_not_found",
            PipelineError::WorkspaceCreationFailed(_) => "workspace_creation_failed",
            PipelineError::AgentExecutionFailed(_) => "agent_execution_failed",
            PipelineError::TestsExhausted { .. } => "tests_exhausted",
            PipelineError::ProjectTypeUnknown(_) => "project_type_unknown",
            PipelineError::TestExecutionFailed(_) => "test_execution_failed",
            PipelineError::CommitFailed(_) => "commit_failed",
            PipelineError::PrCreationFailed(_) => "pr_creation_failed",
            PipelineError::Aborted(_) => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tests_exhausted_message_counts_fix_attempts() {
        let err = PipelineError::TestsExhausted {
            attempts: 3,
            last_output: "test result: FAILED".to_string(),
        };
        assert_eq!(err.to_string(), "tests still failing after 3 fix attempt(s)");
        assert_eq!(err.kind(), "tests_exhausted");
    }

    #[test]
    fn agent_failure_is_distinct_from_tests_exhausted() {
        let agent = PipelineError::AgentExecutionFailed("exit 1".to_string());
        let tests = PipelineError::TestsExhausted {
            attempts: 0,
            last_output: String::new(),
        };
        assert_ne!(agent.kind(), tests.kind());
    }
}
