// provisioner.rs — WorktreeProvisioner: one isolated worktree per pipeline run.
//
// Layout: `<worktrees_dir>/<sanitized-ticket>-<8 hex chars>`. The random
// suffix keeps concurrent runs of the same ticket apart; the branch name is
// deterministic so a rerun picks up the existing branch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tp_submit::SourceHost;
use uuid::Uuid;

use crate::branch::sanitize_branch_name;
use crate::error::WorkspaceError;

/// A provisioned worktree, owned by exactly one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    /// Directory the agent and tests run in.
    pub path: PathBuf,
    /// Branch checked out in the worktree.
    pub branch: String,
    /// Whether the branch was created for this run (vs. reused).
    pub created_branch: bool,
}

/// Creates and destroys worktrees through a [`SourceHost`].
pub struct WorktreeProvisioner {
    host: Arc<dyn SourceHost>,
    worktrees_dir: PathBuf,
    branch_prefix: String,
}

impl WorktreeProvisioner {
    pub fn new(host: Arc<dyn SourceHost>, worktrees_dir: impl Into<PathBuf>) -> Self {
        Self {
            host,
            worktrees_dir: worktrees_dir.into(),
            branch_prefix: String::new(),
        }
    }

    /// Prefix prepended to every sanitized branch name (e.g., "feature/").
    pub fn with_branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.branch_prefix = prefix.into();
        self
    }

    /// Branch name a ticket maps to.
    pub fn branch_for(&self, ticket: &str) -> String {
        format!("{}{}", self.branch_prefix, sanitize_branch_name(ticket))
    }

    /// Fresh, unique directory for a ticket's worktree.
    pub fn unique_path(&self, ticket: &str) -> PathBuf {
        let slug = sanitize_branch_name(ticket).replace('/', "-");
        let suffix = Uuid::new_v4().simple().to_string();
        self.worktrees_dir
            .join(format!("{}-{}", slug, &suffix[..8]))
    }

    /// Create a worktree for `ticket`.
    ///
    /// Reuses the ticket's branch when it already exists; otherwise fetches
    /// `base_branch` and creates the branch from it. Any failure is reported
    /// as [`WorkspaceError::CreationFailed`] carrying the attempted path.
    pub async fn provision(
        &self,
        ticket: &str,
        base_branch: &str,
        repo_root: &Path,
    ) -> Result<Workspace, WorkspaceError> {
        std::fs::create_dir_all(&self.worktrees_dir).map_err(|source| {
            WorkspaceError::IoError {
                path: self.worktrees_dir.clone(),
                source,
            }
        })?;

        let path = self.unique_path(ticket);
        let branch = self.branch_for(ticket);
        let failed = |reason: String| WorkspaceError::CreationFailed {
            path: path.clone(),
            reason,
        };

        let exists = self
            .host
            .branch_exists(&branch, repo_root)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if exists {
            tracing::info!(ticket = %ticket, branch = %branch, "reusing existing branch");
            self.host
                .create_worktree(&path, &branch, None, repo_root)
                .await
                .map_err(|e| failed(e.to_string()))?;
        } else {
            tracing::info!(ticket = %ticket, branch = %branch, base = %base_branch, "creating branch");
            self.host
                .fetch_latest(base_branch, repo_root)
                .await
                .map_err(|e| failed(format!("fetching {}: {}", base_branch, e)))?;
            self.host
                .create_worktree(&path, &branch, Some(base_branch), repo_root)
                .await
                .map_err(|e| failed(e.to_string()))?;
        }

        Ok(Workspace {
            path,
            branch,
            created_branch: !exists,
        })
    }

    /// Remove a worktree directory and prune stale metadata.
    ///
    /// Best-effort: failures are logged, never returned.
    pub async fn teardown(&self, path: &Path, repo_root: &Path) {
        match self.host.remove_worktree(path, repo_root).await {
            Ok(()) => tracing::debug!(path = %path.display(), "worktree removed"),
            Err(e) => tracing::warn!(
                path = %path.display(),
                "failed to remove worktree (leaving it on disk): {}",
                e
            ),
        }
    }
}
