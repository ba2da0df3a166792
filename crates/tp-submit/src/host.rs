//! Core SourceHost trait and result types

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during source host operations
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    #[error("VCS operation failed: {0}")]
    VcsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Review creation failed: {0}")]
    ReviewError(String),
}

pub type Result<T> = std::result::Result<T, SubmitError>;

/// Everything needed to open a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestParams {
    pub title: String,
    pub body: String,
    /// Branch holding the changes.
    pub head: String,
    /// Branch the PR merges into.
    pub base: String,
    pub draft: bool,
    /// Directory to run the host tooling from (the pipeline's worktree).
    pub work_dir: PathBuf,
}

/// A pull request that was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
}

impl PullRequest {
    /// Build from a PR URL, extracting the trailing number when present
    /// (e.g., https://github.com/owner/repo/pull/123).
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let number = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok());
        Self { url, number }
    }
}

/// Repository and code-review host used by pipelines.
///
/// Calls from concurrently running pipelines target disjoint worktrees and
/// branches; implementations only need to tolerate concurrent invocation.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Add a worktree at `path` checked out on `branch`.
    ///
    /// With `base_branch`, the branch is created from the latest known tip of
    /// that base. Without it, `branch` must already exist.
    async fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        base_branch: Option<&str>,
        repo_root: &Path,
    ) -> Result<()>;

    /// Remove a worktree and prune stale worktree metadata.
    async fn remove_worktree(&self, path: &Path, repo_root: &Path) -> Result<()>;

    /// Whether a local branch with this name exists in the repository.
    async fn branch_exists(&self, branch: &str, repo_root: &Path) -> Result<bool>;

    /// Stage everything in `dir`, commit, and push `branch`.
    ///
    /// Returns `false` without committing when there is nothing to commit.
    async fn commit_and_push(&self, message: &str, branch: &str, dir: &Path) -> Result<bool>;

    /// Open a pull request.
    async fn create_pull_request(&self, params: &PullRequestParams) -> Result<PullRequest>;

    /// Fetch the latest state of `branch` from the remote.
    async fn fetch_latest(&self, branch: &str, dir: &Path) -> Result<()>;

    /// Host display name (for CLI output)
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_number_from_url() {
        let pr = PullRequest::from_url("https://github.com/acme/app/pull/123");
        assert_eq!(pr.number, Some(123));
    }

    #[test]
    fn pull_request_without_number() {
        let pr = PullRequest::from_url("https://review.example.com/changes/abc");
        assert_eq!(pr.number, None);
        assert_eq!(pr.url, "https://review.example.com/changes/abc");
    }
}
