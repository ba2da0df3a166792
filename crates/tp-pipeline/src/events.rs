// events.rs — Pipeline events and notification dispatch.
//
// Pipelines emit events at every state change and at a few other points
// worth reporting (test runs, PR opened, advisory tracker failures).
// Sinks subscribe to them: the JSONL log under `.tp/events.jsonl`, the
// terminal progress printer in the CLI, and test recorders.
//
// Dispatch is synchronous and shared across concurrently running
// pipelines, so sinks must be `Send + Sync`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::PipelineState;

/// Events emitted while pipelines run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A pipeline picked up a ticket.
    PipelineStarted {
        run_id: Uuid,
        ticket: String,
        timestamp: DateTime<Utc>,
    },

    /// A pipeline changed state.
    StateChanged {
        run_id: Uuid,
        ticket: String,
        from_state: String,
        to_state: String,
        timestamp: DateTime<Utc>,
    },

    /// A test run finished.
    TestRunCompleted {
        run_id: Uuid,
        ticket: String,
        attempt: u32,
        passed: bool,
        timestamp: DateTime<Utc>,
    },

    /// A pull request was opened.
    PullRequestOpened {
        run_id: Uuid,
        ticket: String,
        url: String,
        timestamp: DateTime<Utc>,
    },

    /// A tracker update that does not affect the outcome failed.
    AdvisoryStepFailed {
        run_id: Uuid,
        ticket: String,
        step: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A pipeline reached a terminal state.
    PipelineFinished {
        run_id: Uuid,
        ticket: String,
        outcome: String,
        detail: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Get the event type name as a string.
    pub fn event_type(&self) -> &str {
        match self {
            PipelineEvent::PipelineStarted { .. } => "pipeline_started",
            PipelineEvent::StateChanged { .. } => "state_changed",
            PipelineEvent::TestRunCompleted { .. } => "test_run_completed",
            PipelineEvent::PullRequestOpened { .. } => "pull_request_opened",
            PipelineEvent::AdvisoryStepFailed { .. } => "advisory_step_failed",
            PipelineEvent::PipelineFinished { .. } => "pipeline_finished",
        }
    }

    /// Ticket the event belongs to.
    pub fn ticket(&self) -> &str {
        match self {
            PipelineEvent::PipelineStarted { ticket, .. }
            | PipelineEvent::StateChanged { ticket, .. }
            | PipelineEvent::TestRunCompleted { ticket, .. }
            | PipelineEvent::PullRequestOpened { ticket, .. }
            | PipelineEvent::AdvisoryStepFailed { ticket, .. }
            | PipelineEvent::PipelineFinished { ticket, .. } => ticket,
        }
    }

    /// One-line human description, used for progress output.
    pub fn describe(&self) -> String {
        match self {
            PipelineEvent::PipelineStarted { .. } => "Started".to_string(),
            PipelineEvent::StateChanged { to_state, .. } => match to_state.as_str() {
                "marking_in_progress" => "Marking issue in progress...".to_string(),
                "provisioning" => "Provisioning workspace...".to_string(),
                "implementing" => "Agent implementing...".to_string(),
                "testing" => "Running tests...".to_string(),
                "committing" => "Committing and pushing...".to_string(),
                "opening_pr" => "Opening pull request...".to_string(),
                "marking_in_review" => "Marking issue in review...".to_string(),
                other => other.replace('_', " "),
            },
            PipelineEvent::TestRunCompleted {
                attempt, passed, ..
            } => {
                if *passed {
                    format!("Tests passed (fix attempts: {})", attempt)
                } else {
                    format!("Tests failed (fix attempts so far: {})", attempt)
                }
            }
            PipelineEvent::PullRequestOpened { url, .. } => format!("PR opened: {}", url),
            PipelineEvent::AdvisoryStepFailed { step, message, .. } => {
                format!("Warning: {} failed: {}", step, message)
            }
            PipelineEvent::PipelineFinished {
                outcome, detail, ..
            } => {
                if detail.is_empty() {
                    outcome.clone()
                } else {
                    format!("{}: {}", outcome, detail)
                }
            }
        }
    }

    pub fn pipeline_started(run_id: Uuid, ticket: &str) -> Self {
        PipelineEvent::PipelineStarted {
            run_id,
            ticket: ticket.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn state_changed(
        run_id: Uuid,
        ticket: &str,
        from: &PipelineState,
        to: &PipelineState,
    ) -> Self {
        PipelineEvent::StateChanged {
            run_id,
            ticket: ticket.to_string(),
            from_state: from.to_string(),
            to_state: to.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Trait for receiving pipeline events.
pub trait NotificationSink: Send + Sync {
    /// Handle an event. Errors are logged but don't stop the pipeline.
    fn send(&self, event: &PipelineEvent) -> std::io::Result<()>;
}

/// Logs events as JSONL to a file (always-on sink).
pub struct LogSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &PipelineEvent) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(event)?;
        // One whole line per write; concurrent pipelines share this sink.
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)
    }
}

/// Dispatches events to multiple sinks.
///
/// Errors from individual sinks are logged (via tracing) but don't
/// prevent other sinks from receiving the event.
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    /// Create a new dispatcher with no sinks.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a notification sink.
    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    /// Dispatch an event to all sinks.
    pub fn dispatch(&self, event: &PipelineEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(ticket = %event.ticket(), "notification sink error: {}", e);
            }
        }
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
