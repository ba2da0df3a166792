// issue.rs — TaskIssue: the ticket snapshot a pipeline works from.

use serde::{Deserialize, Serialize};

/// A ticket fetched from the tracker.
///
/// Fetched once at the start of a pipeline run and never refreshed. Some
/// trackers don't carry a description, so it is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIssue {
    /// Tracker-specific identifier (e.g., "IOS-1234").
    pub id: String,

    /// One-line summary.
    pub title: String,

    /// Longer body text, if the tracker provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskIssue {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description with surrounding whitespace removed; `None` when blank.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}
