// config.rs — Project layout and `.tp/config.toml`.
//
// Lookup order: an explicit `--config` path, then `<project>/.tp/config.toml`,
// then `<user config dir>/ticket-pilot/config.toml`, then built-in defaults.
// Every section and field is optional.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tp_submit::SubmitConfig;

/// Where ticket-pilot keeps its files inside a project.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Repository root (worktrees are linked to it).
    pub root: PathBuf,
    /// `.tp/` state directory.
    pub state_dir: PathBuf,
    pub config_file: PathBuf,
    /// JSONL pipeline event log.
    pub events_log: PathBuf,
    /// Session records (ticket ↔ agent session ↔ PR).
    pub sessions_dir: PathBuf,
    /// Default ticket directory for the local tracker.
    pub tickets_dir: PathBuf,
}

impl ProjectLayout {
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let state_dir = root.join(".tp");
        Self {
            config_file: state_dir.join("config.toml"),
            events_log: state_dir.join("events.jsonl"),
            sessions_dir: state_dir.join("sessions"),
            tickets_dir: state_dir.join("tickets"),
            state_dir,
            root,
        }
    }

    /// Default parent for per-ticket worktrees, outside the repository.
    pub fn default_worktrees_dir(&self) -> PathBuf {
        let project = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        std::env::temp_dir()
            .join("ticket-pilot-worktrees")
            .join(project)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    pub tracker: TrackerConfig,
    pub submit: SubmitConfig,
    pub agent: AgentConfig,
    pub tests: TestsConfig,
    pub parallel: ParallelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Tracker backend. Only "local" ships with ticket-pilot.
    pub kind: String,
    /// Ticket directory for the local tracker (default `.tp/tickets`).
    pub tickets_dir: Option<PathBuf>,
    /// Base for human issue links (`<base_url>/<id>`).
    pub base_url: Option<String>,
    /// Status set when work starts; empty disables the update.
    pub in_progress_status: String,
    /// Status set once the PR is open; empty disables the update.
    pub in_review_status: String,
    /// Workflow statuses the local tracker accepts (default: To Do,
    /// In Progress, In Review, Done).
    pub statuses: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            kind: "local".to_string(),
            tickets_dir: None,
            base_url: None,
            in_progress_status: "In Progress".to_string(),
            in_review_status: "In Review".to_string(),
            statuses: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// "claude-code", "codex", or the name of any other executable.
    pub kind: String,
    /// Executable override (e.g., an absolute path).
    pub command: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: "claude-code".to_string(),
            command: None,
            timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestsConfig {
    /// Fix-and-retest cycles after the first failing run.
    pub max_attempts: u32,
    pub skip: bool,
    /// Shell command replacing manifest detection.
    pub command: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            skip: false,
            command: None,
            timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub max_concurrent: usize,
    pub worktrees_dir: Option<PathBuf>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            worktrees_dir: None,
        }
    }
}

impl PilotConfig {
    /// Load configuration for a project.
    pub fn load(layout: &ProjectLayout, explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if layout.config_file.exists() {
            return Self::from_file(&layout.config_file);
        }
        if let Some(user) = user_config_file() {
            if user.exists() {
                return Self::from_file(&user);
            }
        }
        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: PilotConfig = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Ticket directory, resolved against the project root.
    pub fn tickets_dir(&self, layout: &ProjectLayout) -> PathBuf {
        match &self.tracker.tickets_dir {
            Some(dir) if dir.is_relative() => layout.root.join(dir),
            Some(dir) => dir.clone(),
            None => layout.tickets_dir.clone(),
        }
    }

    pub fn worktrees_dir(&self, layout: &ProjectLayout) -> PathBuf {
        match &self.parallel.worktrees_dir {
            Some(dir) if dir.is_relative() => layout.root.join(dir),
            Some(dir) => dir.clone(),
            None => layout.default_worktrees_dir(),
        }
    }

    /// PR template, resolved against the project root.
    pub fn pr_template(&self, layout: &ProjectLayout) -> Option<PathBuf> {
        self.submit.pr_template.as_ref().map(|p| {
            if p.is_relative() {
                layout.root.join(p)
            } else {
                p.clone()
            }
        })
    }
}

fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ticket-pilot").join("config.toml"))
}
