//! Core TaskTracker trait

use async_trait::async_trait;

use crate::error::Result;
use crate::issue::TaskIssue;

/// Pluggable task tracker used by pipelines.
///
/// Implementations must be safe to share across concurrently running
/// pipelines; each pipeline only ever touches its own ticket.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Fetch the current snapshot of an issue.
    async fn fetch_issue(&self, id: &str) -> Result<TaskIssue>;

    /// Move an issue to the named status.
    ///
    /// Fails with `TrackerError::InvalidStatus` when the tracker has no
    /// such status for this issue.
    async fn change_status(&self, id: &str, to: &str) -> Result<()>;

    /// Attach a pull request link to the issue.
    async fn update_issue(&self, id: &str, pr_url: &str) -> Result<()>;

    /// Base URL used to build human links to issues.
    fn base_url(&self) -> &str;

    /// Tracker display name (for CLI output)
    fn name(&self) -> &str;

    /// Human link to an issue, e.g. `https://jira.example.com/browse/IOS-1`.
    fn issue_link(&self, id: &str) -> String {
        format!("{}/{}", self.base_url().trim_end_matches('/'), id)
    }
}
