// local.rs — LocalTracker: a file-backed tracker for offline use and testing.
//
// Each ticket is stored as a JSON file: `<tickets_dir>/<ID>.json`.
// Status changes and PR links are written back to the same file, which keeps
// the store easy to inspect and edit by hand.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::issue::TaskIssue;
use crate::tracker::TaskTracker;

/// Statuses offered when the config does not name any.
pub const DEFAULT_STATUSES: &[&str] = &["To Do", "In Progress", "In Review", "Done"];

/// On-disk ticket record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTicket {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    /// Pull requests linked to this ticket, oldest first.
    #[serde(default)]
    pub pr_urls: Vec<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_status() -> String {
    DEFAULT_STATUSES[0].to_string()
}

impl LocalTicket {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            status: default_status(),
            pr_urls: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Tracker backed by a directory of JSON ticket files.
pub struct LocalTracker {
    tickets_dir: PathBuf,
    base_url: String,
    statuses: Vec<String>,
}

impl LocalTracker {
    /// Create a tracker over the given directory, creating it if needed.
    pub fn new(tickets_dir: impl AsRef<Path>, base_url: impl Into<String>) -> Result<Self> {
        let tickets_dir = tickets_dir.as_ref().to_path_buf();
        fs::create_dir_all(&tickets_dir).map_err(|source| TrackerError::IoError {
            path: tickets_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            tickets_dir,
            base_url: base_url.into(),
            statuses: DEFAULT_STATUSES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the set of statuses tickets may move between.
    pub fn with_statuses(mut self, statuses: Vec<String>) -> Self {
        if !statuses.is_empty() {
            self.statuses = statuses;
        }
        self
    }

    /// Save a ticket to disk (creates or overwrites).
    pub fn save(&self, ticket: &LocalTicket) -> Result<()> {
        let path = self.ticket_file(&ticket.id)?;
        let json = serde_json::to_string_pretty(ticket)?;
        fs::write(&path, json).map_err(|source| TrackerError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load a ticket record, `None` if there is no file for it.
    pub fn get(&self, id: &str) -> Result<Option<LocalTicket>> {
        let path = self.ticket_file(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| TrackerError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn ticket_file(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(TrackerError::FetchFailed {
                id: id.to_string(),
                reason: "ticket id is not a valid file name".to_string(),
            });
        }
        Ok(self.tickets_dir.join(format!("{}.json", id)))
    }

    fn load_existing(&self, id: &str) -> Result<LocalTicket> {
        self.get(id)?
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl TaskTracker for LocalTracker {
    async fn fetch_issue(&self, id: &str) -> Result<TaskIssue> {
        let ticket = self.load_existing(id)?;
        Ok(TaskIssue {
            id: ticket.id,
            title: ticket.title,
            description: ticket.description,
        })
    }

    async fn change_status(&self, id: &str, to: &str) -> Result<()> {
        let status = self
            .statuses
            .iter()
            .find(|s| s.eq_ignore_ascii_case(to))
            .cloned()
            .ok_or_else(|| TrackerError::InvalidStatus {
                requested: to.to_string(),
                available: self.statuses.clone(),
            })?;

        let mut ticket = self.load_existing(id)?;
        tracing::debug!(ticket = %id, from = %ticket.status, to = %status, "local status change");
        ticket.status = status;
        ticket.updated_at = Utc::now();
        self.save(&ticket)
    }

    async fn update_issue(&self, id: &str, pr_url: &str) -> Result<()> {
        let mut ticket = self.load_existing(id)?;
        if !ticket.pr_urls.iter().any(|u| u == pr_url) {
            ticket.pr_urls.push(pr_url.to_string());
        }
        ticket.updated_at = Utc::now();
        self.save(&ticket)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn name(&self) -> &str {
        "local"
    }
}
