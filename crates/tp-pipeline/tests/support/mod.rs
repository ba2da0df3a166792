// Hand-written collaborators shared by the pipeline integration tests.
//
// Each mock records what it was asked to do so tests can assert call
// counts (teardown once, fix prompts twice, no PR on empty diffs).

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tp_agent::{AgentContext, AgentError, AgentResult, AgentSession};
use tp_pipeline::{
    EventDispatcher, NotificationSink, Pipeline, PipelineEvent, PipelineOptions, TestOutcome,
    TestRunError, TestRunner,
};
use tp_submit::{PullRequest, PullRequestParams, SourceHost, SubmitError};
use tp_tracker::{TaskIssue, TaskTracker, TrackerError};
use tp_workspace::WorktreeProvisioner;

// ── Tracker ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockTracker {
    pub issues: HashMap<String, TaskIssue>,
    pub fail_status_updates: bool,
    pub status_changes: Mutex<Vec<(String, String)>>,
    pub linked: Mutex<Vec<(String, String)>>,
}

impl MockTracker {
    pub fn with_issues(ids: &[&str]) -> Self {
        Self {
            issues: ids
                .iter()
                .map(|id| {
                    (
                        id.to_string(),
                        TaskIssue::new(*id, format!("Implement {}", id))
                            .with_description("Make it work."),
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn statuses_for(&self, id: &str) -> Vec<String> {
        self.status_changes
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == id)
            .map(|(_, s)| s.clone())
            .collect()
    }
}

#[async_trait]
impl TaskTracker for MockTracker {
    async fn fetch_issue(&self, id: &str) -> tp_tracker::error::Result<TaskIssue> {
        self.issues
            .get(id)
            .cloned()
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }

    async fn change_status(&self, id: &str, to: &str) -> tp_tracker::error::Result<()> {
        self.status_changes
            .lock()
            .unwrap()
            .push((id.to_string(), to.to_string()));
        if self.fail_status_updates {
            return Err(TrackerError::UpdateFailed {
                id: id.to_string(),
                reason: "tracker unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn update_issue(&self, id: &str, pr_url: &str) -> tp_tracker::error::Result<()> {
        self.linked
            .lock()
            .unwrap()
            .push((id.to_string(), pr_url.to_string()));
        Ok(())
    }

    fn base_url(&self) -> &str {
        "https://tracker.example.com/browse"
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ── Source host ──────────────────────────────────────────────────────

/// Creates real directories for worktrees. A commit "has changes" when the
/// worktree contains at least one file.
#[derive(Default)]
pub struct MockHost {
    pub fail_worktree: bool,
    pub fail_commit: bool,
    pub fail_pr: bool,
    pub created: Mutex<Vec<PathBuf>>,
    pub removed: Mutex<Vec<PathBuf>>,
    pub commits: Mutex<Vec<String>>,
    pub pull_requests: Mutex<Vec<PullRequestParams>>,
    pub next_pr: AtomicU32,
}

impl MockHost {
    pub fn removals_of(&self, path: &Path) -> usize {
        self.removed
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_path() == path)
            .count()
    }

    pub fn removal_count(&self) -> usize {
        self.removed.lock().unwrap().len()
    }

    pub fn pr_count(&self) -> usize {
        self.pull_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SourceHost for MockHost {
    async fn create_worktree(
        &self,
        path: &Path,
        _branch: &str,
        _base_branch: Option<&str>,
        _repo_root: &Path,
    ) -> tp_submit::Result<()> {
        self.created.lock().unwrap().push(path.to_path_buf());
        // Leave partial state behind even when failing.
        std::fs::create_dir_all(path)?;
        if self.fail_worktree {
            return Err(SubmitError::VcsError("fatal: disk full".to_string()));
        }
        Ok(())
    }

    async fn remove_worktree(&self, path: &Path, _repo_root: &Path) -> tp_submit::Result<()> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    async fn branch_exists(&self, _branch: &str, _repo_root: &Path) -> tp_submit::Result<bool> {
        Ok(false)
    }

    async fn commit_and_push(&self, message: &str, _branch: &str, dir: &Path) -> tp_submit::Result<bool> {
        if self.fail_commit {
            return Err(SubmitError::VcsError(
                "git push: remote rejected (pre-receive hook declined)".to_string(),
            ));
        }
        let has_files = std::fs::read_dir(dir)?.next().is_some();
        if has_files {
            self.commits.lock().unwrap().push(message.to_string());
        }
        Ok(has_files)
    }

    async fn create_pull_request(&self, params: &PullRequestParams) -> tp_submit::Result<PullRequest> {
        if self.fail_pr {
            return Err(SubmitError::ReviewError("gh: not authenticated".to_string()));
        }
        self.pull_requests.lock().unwrap().push(params.clone());
        let n = self.next_pr.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PullRequest::from_url(format!(
            "https://github.com/acme/app/pull/{}",
            n
        )))
    }

    async fn fetch_latest(&self, _branch: &str, _dir: &Path) -> tp_submit::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ── Agent ────────────────────────────────────────────────────────────

/// Writes a file per call (unless `edits` is false) and hands out a fixed
/// session handle.
pub struct ScriptedAgent {
    pub session: Option<String>,
    pub edits: bool,
    pub start_failures: Mutex<VecDeque<AgentError>>,
    pub start_calls: AtomicU32,
    pub continue_calls: AtomicU32,
    pub dirs: Mutex<Vec<PathBuf>>,
    pub prompts: Mutex<Vec<String>>,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self {
            session: Some("session-1".to_string()),
            edits: true,
            start_failures: Mutex::new(VecDeque::new()),
            start_calls: AtomicU32::new(0),
            continue_calls: AtomicU32::new(0),
            dirs: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedAgent {
    pub fn starts(&self) -> u32 {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn fixes(&self) -> u32 {
        self.continue_calls.load(Ordering::SeqCst)
    }

    fn touch(&self, dir: &Path, name: &str) {
        if self.edits {
            std::fs::write(dir.join(name), "change").unwrap();
        }
    }
}

#[async_trait]
impl AgentSession for ScriptedAgent {
    async fn start(&self, prompt: &str, context: &AgentContext) -> tp_agent::error::Result<AgentResult> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.dirs.lock().unwrap().push(context.working_directory.clone());
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(err) = self.start_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.touch(&context.working_directory, "implementation.txt");
        context.observe("implemented");
        Ok(AgentResult {
            output: "Implemented the ticket.".to_string(),
            session_handle: self.session.clone(),
        })
    }

    async fn continue_session(
        &self,
        session_handle: &str,
        prompt: &str,
        context: &AgentContext,
    ) -> tp_agent::error::Result<AgentResult> {
        let n = self.continue_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.touch(&context.working_directory, &format!("fix-{}.txt", n));
        Ok(AgentResult {
            output: "Fixed.".to_string(),
            session_handle: Some(session_handle.to_string()),
        })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ── Tests ────────────────────────────────────────────────────────────

/// Fails the first N runs per worktree, keyed by ticket slug prefix.
#[derive(Default)]
pub struct ScriptedTests {
    pub failures_before_pass: HashMap<String, u32>,
    pub unknown_project: bool,
    /// The test command cannot be started at all.
    pub launch_fails: bool,
    pub runs: Mutex<HashMap<PathBuf, u32>>,
}

impl ScriptedTests {
    pub fn failing(slug: &str, times: u32) -> Self {
        let mut failures_before_pass = HashMap::new();
        failures_before_pass.insert(slug.to_string(), times);
        Self {
            failures_before_pass,
            ..Default::default()
        }
    }

    pub fn always_failing(slug: &str) -> Self {
        Self::failing(slug, u32::MAX)
    }

    pub fn total_runs(&self) -> u32 {
        self.runs.lock().unwrap().values().sum()
    }

    fn failures_for(&self, workspace: &Path) -> u32 {
        let name = workspace
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.failures_before_pass
            .iter()
            .find(|(slug, _)| name.starts_with(&format!("{}-", slug)))
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

#[async_trait]
impl TestRunner for ScriptedTests {
    async fn run(&self, workspace: &Path) -> Result<TestOutcome, TestRunError> {
        if self.unknown_project {
            return Err(TestRunError::ProjectTypeUnknown(workspace.to_path_buf()));
        }
        if self.launch_fails {
            return Err(TestRunError::LaunchFailed {
                command: "cargo test".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "cargo: not found"),
            });
        }
        let run = {
            let mut runs = self.runs.lock().unwrap();
            let count = runs.entry(workspace.to_path_buf()).or_insert(0);
            *count += 1;
            *count
        };
        let passed = run > self.failures_for(workspace);
        let output = if passed {
            "test result: ok. 4 passed; 0 failed".to_string()
        } else {
            format!("test result: FAILED. run {}", run)
        };
        Ok(TestOutcome { passed, output })
    }
}

// ── Events ───────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl NotificationSink for RecordingSink {
    fn send(&self, event: &PipelineEvent) -> std::io::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub dir: TempDir,
    pub tracker: Arc<MockTracker>,
    pub host: Arc<MockHost>,
    pub agent: Arc<ScriptedAgent>,
    pub tests: Arc<ScriptedTests>,
    pub events: Arc<Mutex<Vec<PipelineEvent>>>,
    pub options: PipelineOptions,
}

impl Harness {
    pub fn new(tracker: MockTracker, host: MockHost, agent: ScriptedAgent, tests: ScriptedTests) -> Self {
        let dir = TempDir::new().unwrap();
        let mut options = PipelineOptions::new(dir.path().join("repo"));
        options.agent_retry_cap = Duration::ZERO;
        Self {
            tracker: Arc::new(tracker),
            host: Arc::new(host),
            agent: Arc::new(agent),
            tests: Arc::new(tests),
            events: Arc::new(Mutex::new(Vec::new())),
            options,
            dir,
        }
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.dir.path().join("worktrees")
    }

    pub fn pipeline(&self) -> Pipeline {
        let provisioner = WorktreeProvisioner::new(self.host.clone(), self.worktrees_dir());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(RecordingSink {
            events: self.events.clone(),
        }));
        Pipeline::new(
            self.tracker.clone(),
            self.host.clone(),
            self.agent.clone(),
            self.tests.clone(),
            provisioner,
            self.options.clone(),
        )
        .with_events(Arc::new(dispatcher))
    }

    /// `to_state` of every StateChanged event for a ticket, in order.
    pub fn states_for(&self, ticket: &str) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StateChanged {
                    ticket: t,
                    to_state,
                    ..
                } if t == ticket => Some(to_state.clone()),
                _ => None,
            })
            .collect()
    }
}
