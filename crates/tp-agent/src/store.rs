// store.rs — SessionStore: which agent session produced which PR.
//
// Each record is stored as `<store_dir>/<ticket>.json`, so a later run (or
// a human) can resume the conversation that produced a pull request.
// Newer runs of the same ticket overwrite older records.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Link between a ticket, an agent session, and its pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub ticket: String,
    pub agent: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        ticket: impl Into<String>,
        agent: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            ticket: ticket.into(),
            agent: agent.into(),
            session_id: session_id.into(),
            branch: None,
            pr_url: None,
            recorded_at: Utc::now(),
        }
    }
}

/// Persistent store for session records.
pub struct SessionStore {
    store_dir: PathBuf,
}

impl SessionStore {
    /// Create a new store backed by the given directory.
    /// Creates the directory if it doesn't exist.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|source| AgentError::IoError {
            path: store_dir.display().to_string(),
            source,
        })?;
        Ok(Self { store_dir })
    }

    /// Save a record (creates or overwrites the ticket's record).
    pub fn save(&self, record: &SessionRecord) -> Result<()> {
        let path = self.record_file(&record.ticket);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json).map_err(|source| AgentError::IoError {
            path: path.display().to_string(),
            source,
        })
    }

    /// Latest record for a ticket.
    pub fn get(&self, ticket: &str) -> Result<Option<SessionRecord>> {
        let path = self.record_file(ticket);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| AgentError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// All records, newest first. Unreadable files are skipped.
    pub fn list(&self) -> Result<Vec<SessionRecord>> {
        let entries = fs::read_dir(&self.store_dir).map_err(|source| AgentError::IoError {
            path: self.store_dir.display().to_string(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| AgentError::IoError {
                    path: self.store_dir.display().to_string(),
                    source,
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let parsed = fs::read_to_string(&path)
                    .ok()
                    .and_then(|json| serde_json::from_str::<SessionRecord>(&json).ok());
                match parsed {
                    Some(record) => records.push(record),
                    None => tracing::warn!("skipping unreadable session record {}", path.display()),
                }
            }
        }

        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }

    fn record_file(&self, ticket: &str) -> PathBuf {
        let name: String = ticket
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.store_dir.join(format!("{}.json", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_and_get_round_trip() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("sessions")).unwrap();

        let mut record = SessionRecord::new("IOS-1", "claude-code", "s-1");
        record.pr_url = Some("https://github.com/acme/app/pull/1".to_string());
        store.save(&record).unwrap();

        assert_eq!(store.get("IOS-1").unwrap(), Some(record));
        assert!(store.get("IOS-2").unwrap().is_none());
    }

    #[test]
    fn newer_run_overwrites_ticket_record() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        store
            .save(&SessionRecord::new("IOS-1", "claude-code", "old"))
            .unwrap();
        store
            .save(&SessionRecord::new("IOS-1", "claude-code", "new"))
            .unwrap();

        let records = store.list().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, "new");
    }

    #[test]
    fn list_is_newest_first_and_skips_garbage() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let mut older = SessionRecord::new("IOS-1", "claude-code", "a");
        older.recorded_at = Utc::now() - chrono::Duration::hours(1);
        store.save(&older).unwrap();
        store
            .save(&SessionRecord::new("IOS-2", "claude-code", "b"))
            .unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let records = store.list().unwrap();
        let tickets: Vec<_> = records.iter().map(|r| r.ticket.as_str()).collect();
        assert_eq!(tickets, vec!["IOS-2", "IOS-1"]);
    }

    #[test]
    fn ticket_names_cannot_escape_store() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store
            .save(&SessionRecord::new("../evil/ticket", "codex", "s"))
            .unwrap();
        assert!(dir.path().join("___evil_ticket.json").exists());
        assert_eq!(store.get("../evil/ticket").unwrap().unwrap().session_id, "s");
    }
}
