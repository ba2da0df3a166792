//! Git + GitHub CLI host for worktree-based workflows

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::SubmitConfig;
use crate::host::{PullRequest, PullRequestParams, Result, SourceHost, SubmitError};

/// Source host backed by the `git` and `gh` command-line tools.
///
/// Features:
/// - Worktree creation from the remote tip of the base branch
/// - Commit + push of a pipeline's branch
/// - GitHub PR creation via `gh pr create`
pub struct GitHubCliHost {
    remote: String,
}

impl GitHubCliHost {
    pub fn new(remote: impl Into<String>) -> Self {
        Self {
            remote: remote.into(),
        }
    }

    pub fn from_config(config: &SubmitConfig) -> Self {
        Self::new(config.remote.clone())
    }

    /// Whether `git` and `gh` are both on PATH.
    pub fn tools_available() -> std::result::Result<(), SubmitError> {
        for tool in ["git", "gh"] {
            if which::which(tool).is_err() {
                return Err(SubmitError::ToolMissing(tool.to_string()));
            }
        }
        Ok(())
    }

    /// Run a git command in `dir`, returning trimmed stdout.
    async fn git_cmd(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubmitError::VcsError(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether `git rev-parse --verify` resolves the given ref.
    async fn ref_exists(&self, dir: &Path, reference: &str) -> Result<bool> {
        let status = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", reference])
            .current_dir(dir)
            .output()
            .await?
            .status;
        Ok(status.success())
    }

    /// Remote-tracking ref for `base` when it exists, else the local branch.
    async fn start_point(&self, repo_root: &Path, base: &str) -> Result<String> {
        let remote_ref = format!("{}/{}", self.remote, base);
        if self
            .ref_exists(repo_root, &format!("refs/remotes/{}", remote_ref))
            .await?
        {
            Ok(remote_ref)
        } else {
            Ok(base.to_string())
        }
    }
}

#[async_trait]
impl SourceHost for GitHubCliHost {
    async fn create_worktree(
        &self,
        path: &Path,
        branch: &str,
        base_branch: Option<&str>,
        repo_root: &Path,
    ) -> Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        match base_branch {
            Some(base) => {
                let start = self.start_point(repo_root, base).await?;
                tracing::info!(
                    "GitHubCliHost: creating worktree {} on new branch {} from {}",
                    path_str,
                    branch,
                    start
                );
                self.git_cmd(
                    repo_root,
                    &["worktree", "add", "-b", branch, path_str.as_str(), start.as_str()],
                )
                .await?;
            }
            None => {
                tracing::info!(
                    "GitHubCliHost: creating worktree {} on existing branch {}",
                    path_str,
                    branch
                );
                self.git_cmd(repo_root, &["worktree", "add", path_str.as_str(), branch])
                    .await?;
            }
        }
        Ok(())
    }

    async fn remove_worktree(&self, path: &Path, repo_root: &Path) -> Result<()> {
        let path_str = path.to_string_lossy().into_owned();
        let removed = self
            .git_cmd(repo_root, &["worktree", "remove", "--force", path_str.as_str()])
            .await;

        // git refuses to remove a worktree it no longer knows about; the
        // directory may still be on disk from a half-finished add.
        if path.exists() {
            tokio::fs::remove_dir_all(path).await?;
        }
        self.git_cmd(repo_root, &["worktree", "prune"]).await?;

        if let Err(e) = removed {
            tracing::debug!("GitHubCliHost: worktree remove reported: {}", e);
        }
        Ok(())
    }

    async fn branch_exists(&self, branch: &str, repo_root: &Path) -> Result<bool> {
        self.ref_exists(repo_root, &format!("refs/heads/{}", branch))
            .await
    }

    async fn commit_and_push(&self, message: &str, branch: &str, dir: &Path) -> Result<bool> {
        self.git_cmd(dir, &["add", "-A"]).await?;

        let status = self.git_cmd(dir, &["status", "--porcelain"]).await?;
        if status.is_empty() {
            tracing::info!("GitHubCliHost: nothing to commit in {}", dir.display());
            return Ok(false);
        }

        self.git_cmd(dir, &["commit", "-m", message]).await?;

        tracing::info!("GitHubCliHost: pushing branch {} to {}", branch, self.remote);
        self.git_cmd(dir, &["push", "-u", self.remote.as_str(), branch])
            .await?;
        Ok(true)
    }

    async fn create_pull_request(&self, params: &PullRequestParams) -> Result<PullRequest> {
        if which::which("gh").is_err() {
            return Err(SubmitError::ReviewError(
                "gh CLI not found - install GitHub CLI to create PRs".to_string(),
            ));
        }

        let mut args = vec![
            "pr",
            "create",
            "--base",
            params.base.as_str(),
            "--head",
            params.head.as_str(),
            "--title",
            params.title.as_str(),
            "--body",
            params.body.as_str(),
        ];
        if params.draft {
            args.push("--draft");
        }

        tracing::info!(
            "GitHubCliHost: creating PR {} -> {}",
            params.head,
            params.base
        );

        let output = Command::new("gh")
            .args(&args)
            .current_dir(&params.work_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SubmitError::ReviewError(format!(
                "gh pr create failed: {}",
                stderr.trim()
            )));
        }

        // gh prints progress lines before the URL; the URL is the last line.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| l.starts_with("http"))
            .ok_or_else(|| {
                SubmitError::ReviewError(format!(
                    "gh pr create printed no URL: {}",
                    stdout.trim()
                ))
            })?;

        Ok(PullRequest::from_url(url))
    }

    async fn fetch_latest(&self, branch: &str, dir: &Path) -> Result<()> {
        self.git_cmd(dir, &["fetch", self.remote.as_str(), branch]).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "github-cli"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::process::Command as StdCommand;
    use tempfile::{tempdir, TempDir};

    fn git(dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// A working repo on `main` with a bare `origin` it has pushed to.
    fn repo_with_origin() -> (TempDir, PathBuf) {
        let root = tempdir().unwrap();
        let origin = root.path().join("origin.git");
        let work = root.path().join("work");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        git(&origin, &["init", "--bare", "-b", "main"]);
        git(&work, &["init", "-b", "main"]);
        git(&work, &["config", "user.name", "Test User"]);
        git(&work, &["config", "user.email", "test@example.com"]);
        std::fs::write(work.join("README.md"), "# Test\n").unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "-m", "Initial commit"]);
        git(&work, &["remote", "add", "origin", origin.to_str().unwrap()]);
        git(&work, &["push", "-u", "origin", "main"]);

        (root, work)
    }

    #[tokio::test]
    async fn worktree_lifecycle_on_new_branch() {
        let (root, work) = repo_with_origin();
        let host = GitHubCliHost::new("origin");
        let wt = root.path().join("wt-ios-1");

        host.fetch_latest("main", &work).await.unwrap();
        host.create_worktree(&wt, "ios-1", Some("main"), &work)
            .await
            .unwrap();
        assert!(wt.join("README.md").exists());
        assert!(host.branch_exists("ios-1", &work).await.unwrap());

        host.remove_worktree(&wt, &work).await.unwrap();
        assert!(!wt.exists());
    }

    #[tokio::test]
    async fn existing_branch_is_checked_out() {
        let (root, work) = repo_with_origin();
        git(&work, &["branch", "ios-2"]);
        let host = GitHubCliHost::new("origin");
        let wt = root.path().join("wt-ios-2");

        host.create_worktree(&wt, "ios-2", None, &work).await.unwrap();
        let head = StdCommand::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(&wt)
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&head.stdout).trim(), "ios-2");
    }

    #[tokio::test]
    async fn duplicate_branch_creation_fails() {
        let (root, work) = repo_with_origin();
        git(&work, &["branch", "ios-3"]);
        let host = GitHubCliHost::new("origin");

        let err = host
            .create_worktree(&root.path().join("wt"), "ios-3", Some("main"), &work)
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::VcsError(_)));
    }

    #[tokio::test]
    async fn commit_and_push_reports_empty_diff() {
        let (root, work) = repo_with_origin();
        let host = GitHubCliHost::new("origin");
        let wt = root.path().join("wt-ios-4");
        host.create_worktree(&wt, "ios-4", Some("main"), &work)
            .await
            .unwrap();

        assert!(!host.commit_and_push("noop", "ios-4", &wt).await.unwrap());

        std::fs::write(wt.join("feature.txt"), "dark mode\n").unwrap();
        assert!(host
            .commit_and_push("IOS-4: Add feature", "ios-4", &wt)
            .await
            .unwrap());

        let remote_branches = StdCommand::new("git")
            .args(["branch", "-r"])
            .current_dir(&work)
            .output()
            .unwrap();
        assert!(String::from_utf8_lossy(&remote_branches.stdout).contains("origin/ios-4"));
    }

    #[tokio::test]
    async fn removing_unknown_worktree_still_cleans_directory() {
        let (root, work) = repo_with_origin();
        let host = GitHubCliHost::new("origin");
        let stray = root.path().join("stray");
        std::fs::create_dir_all(stray.join("nested")).unwrap();

        host.remove_worktree(&stray, &work).await.unwrap();
        assert!(!stray.exists());
    }
}
