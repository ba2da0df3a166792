// pipeline.rs — One ticket from issue to pull request.
//
// A Pipeline holds the shared collaborators (tracker, source host, agent,
// test runner, provisioner) and runs any number of tickets, one
// `execute` call per ticket. All per-ticket state lives in a `Run` local
// to that call, so concurrent executions never share mutable state.
//
// Teardown: once provisioning has produced (or partially produced) a
// worktree, it is removed exactly once after the run reaches a terminal
// state, unless `keep_workspace` is set.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tp_agent::{AgentContext, AgentError, AgentResult, AgentSession, DEFAULT_AGENT_TIMEOUT};
use tp_submit::{PrBodyContext, PullRequestParams, SourceHost};
use tp_tracker::{TaskIssue, TaskTracker, TrackerError};
use tp_workspace::{WorkspaceError, WorktreeProvisioner};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::events::{EventDispatcher, PipelineEvent};
use crate::prompt;
use crate::result::{PipelineReport, PipelineResult};
use crate::retry::RetryState;
use crate::state::PipelineState;
use crate::test_runner::{TestRunError, TestRunner};

/// Wait before retrying an agent call that failed transiently without
/// suggesting a backoff.
pub const DEFAULT_AGENT_BACKOFF: Duration = Duration::from_secs(5);

/// Longest wait before retrying a transient agent failure.
pub const MAX_AGENT_BACKOFF: Duration = Duration::from_secs(60);

/// Per-run settings shared by every ticket in a batch.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Repository the worktrees are linked to.
    pub repo_root: PathBuf,
    /// Branch new work starts from and PRs target.
    pub base_branch: String,
    /// Fix-and-retest cycles allowed after the first failing test run.
    pub max_test_attempts: u32,
    pub skip_tests: bool,
    pub draft: bool,
    /// Leave the worktree on disk after the run.
    pub keep_workspace: bool,
    /// Tracker status for "being worked on"; empty disables the update.
    pub in_progress_status: String,
    /// Tracker status for "PR open"; empty disables the update.
    pub in_review_status: String,
    pub agent_timeout: Duration,
    /// Upper bound on the wait before retrying a transient agent failure.
    pub agent_retry_cap: Duration,
    pub pr_template: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            base_branch: "main".to_string(),
            max_test_attempts: 3,
            skip_tests: false,
            draft: false,
            keep_workspace: false,
            in_progress_status: "In Progress".to_string(),
            in_review_status: "In Review".to_string(),
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            agent_retry_cap: MAX_AGENT_BACKOFF,
            pr_template: None,
        }
    }
}

/// Anything that can take a ticket to a terminal report.
///
/// The scheduler depends on this rather than on [`Pipeline`] directly.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run(&self, ticket: &str) -> PipelineReport;
}

/// How a successful run ended.
enum Completion {
    PullRequest(String),
    NoChanges,
}

#[derive(Clone, Copy)]
enum AgentCall<'a> {
    Start,
    Continue(&'a str),
}

/// State of one ticket's run.
struct Run<'a> {
    id: Uuid,
    ticket: &'a str,
    state: PipelineState,
    events: &'a EventDispatcher,
    workspace_path: Option<PathBuf>,
    branch: Option<String>,
    session: Option<String>,
}

impl<'a> Run<'a> {
    fn new(ticket: &'a str, events: &'a EventDispatcher) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket,
            state: PipelineState::Fetching,
            events,
            workspace_path: None,
            branch: None,
            session: None,
        }
    }

    fn enter(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "invalid pipeline transition {} -> {}",
            self.state,
            next
        );
        tracing::info!(ticket = %self.ticket, from = %self.state, to = %next, "pipeline state changed");
        self.events.dispatch(&PipelineEvent::state_changed(
            self.id,
            self.ticket,
            &self.state,
            &next,
        ));
        self.state = next;
    }

    fn advisory_failed(&self, step: &str, message: String) {
        tracing::warn!(ticket = %self.ticket, step = %step, "advisory step failed: {}", message);
        self.events.dispatch(&PipelineEvent::AdvisoryStepFailed {
            run_id: self.id,
            ticket: self.ticket.to_string(),
            step: step.to_string(),
            message,
            timestamp: Utc::now(),
        });
    }
}

/// Runs tickets through the full issue → PR sequence.
pub struct Pipeline {
    tracker: Arc<dyn TaskTracker>,
    host: Arc<dyn SourceHost>,
    agent: Arc<dyn AgentSession>,
    tests: Arc<dyn TestRunner>,
    provisioner: WorktreeProvisioner,
    events: Arc<EventDispatcher>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        tracker: Arc<dyn TaskTracker>,
        host: Arc<dyn SourceHost>,
        agent: Arc<dyn AgentSession>,
        tests: Arc<dyn TestRunner>,
        provisioner: WorktreeProvisioner,
        options: PipelineOptions,
    ) -> Self {
        Self {
            tracker,
            host,
            agent,
            tests,
            provisioner,
            events: Arc::new(EventDispatcher::new()),
            options,
        }
    }

    pub fn with_events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Take `ticket` to a terminal state and report how it ended.
    ///
    /// Never fails: every error becomes a `PipelineResult::Failure`.
    pub async fn execute(&self, ticket: &str) -> PipelineReport {
        let started = Instant::now();
        let mut run = Run::new(ticket, &self.events);
        tracing::info!(ticket = %ticket, run_id = %run.id, "pipeline started");
        self.events
            .dispatch(&PipelineEvent::pipeline_started(run.id, ticket));

        let outcome = self.drive(&mut run).await;

        if let Err(error) = &outcome {
            run.enter(PipelineState::Failed {
                reason: error.to_string(),
            });
        }

        let mut kept_workspace = None;
        if let Some(path) = run.workspace_path.take() {
            if self.options.keep_workspace {
                tracing::info!(ticket = %ticket, path = %path.display(), "keeping worktree");
                kept_workspace = Some(path);
            } else {
                self.provisioner
                    .teardown(&path, &self.options.repo_root)
                    .await;
            }
        }

        let duration = started.elapsed();
        let result = match outcome {
            Ok(Completion::PullRequest(pr_url)) => PipelineResult::Success { pr_url, duration },
            Ok(Completion::NoChanges) => PipelineResult::NoChanges { duration },
            Err(error) => PipelineResult::Failure { error, duration },
        };

        match &result {
            PipelineResult::Failure { error, .. } => tracing::warn!(
                ticket = %ticket,
                kind = error.kind(),
                elapsed_ms = duration.as_millis() as u64,
                "pipeline failed: {}",
                error
            ),
            other => tracing::info!(
                ticket = %ticket,
                result = other.label(),
                elapsed_ms = duration.as_millis() as u64,
                "pipeline finished"
            ),
        }
        self.events.dispatch(&PipelineEvent::PipelineFinished {
            run_id: run.id,
            ticket: ticket.to_string(),
            outcome: result.label().to_string(),
            detail: result.detail(),
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });

        PipelineReport {
            ticket: ticket.to_string(),
            result,
            branch: run.branch,
            session_handle: run.session,
            kept_workspace,
        }
    }

    async fn drive(&self, run: &mut Run<'_>) -> Result<Completion, PipelineError> {
        let issue = self
            .tracker
            .fetch_issue(run.ticket)
            .await
            .map_err(|e| match e {
                TrackerError::NotFound(id) => PipelineError::IssueNotFound(id),
                TrackerError::FetchFailed { id, reason } => {
                    PipelineError::IssueFetchFailed { id, reason }
                }
                other => PipelineError::IssueFetchFailed {
                    id: run.ticket.to_string(),
                    reason: other.to_string(),
                },
            })?;

        run.enter(PipelineState::MarkingInProgress);
        self.mark_status(run, &self.options.in_progress_status).await;

        run.enter(PipelineState::Provisioning);
        let workspace = match self
            .provisioner
            .provision(run.ticket, &self.options.base_branch, &self.options.repo_root)
            .await
        {
            Ok(workspace) => workspace,
            Err(WorkspaceError::CreationFailed { path, reason }) => {
                let message = format!("{}: {}", path.display(), reason);
                // Partial state may exist at `path`.
                run.workspace_path = Some(path);
                return Err(PipelineError::WorkspaceCreationFailed(message));
            }
            Err(other) => return Err(PipelineError::WorkspaceCreationFailed(other.to_string())),
        };
        run.workspace_path = Some(workspace.path.clone());
        run.branch = Some(workspace.branch.clone());

        run.enter(PipelineState::Implementing);
        let context = self.agent_context(run.ticket, &workspace.path);
        let link = self.tracker.issue_link(&issue.id);
        let implementation = self
            .call_agent(
                run.ticket,
                AgentCall::Start,
                &prompt::implementation_prompt(&issue, &link),
                &context,
            )
            .await?;
        run.session = implementation.session_handle.clone();

        let tests_note = if self.options.skip_tests {
            tracing::info!(ticket = %run.ticket, "skipping tests");
            "Skipped".to_string()
        } else {
            match self.test_with_retry(run, &issue, &context).await? {
                0 => "Passed".to_string(),
                fixes => format!("Passed after {} fix attempt(s)", fixes),
            }
        };

        run.enter(PipelineState::Committing);
        let message = format!("{}: {}", issue.id, issue.title);
        let pushed = self
            .host
            .commit_and_push(&message, &workspace.branch, &workspace.path)
            .await
            .map_err(|e| PipelineError::CommitFailed(e.to_string()))?;
        if !pushed {
            tracing::info!(ticket = %run.ticket, "agent made no changes");
            run.enter(PipelineState::NoChanges);
            return Ok(Completion::NoChanges);
        }

        run.enter(PipelineState::OpeningPr);
        let body = PrBodyContext {
            ticket_id: issue.id.clone(),
            title: issue.title.clone(),
            description: issue.description_text().map(str::to_string),
            link,
            agent_output: implementation.output,
            tests: tests_note,
        }
        .render(self.options.pr_template.as_deref())
        .map_err(|e| PipelineError::PrCreationFailed(format!("rendering body: {}", e)))?;

        let pr = self
            .host
            .create_pull_request(&PullRequestParams {
                title: format!("[{}] {}", issue.id, issue.title),
                body,
                head: workspace.branch.clone(),
                base: self.options.base_branch.clone(),
                draft: self.options.draft,
                work_dir: workspace.path.clone(),
            })
            .await
            .map_err(|e| PipelineError::PrCreationFailed(e.to_string()))?;

        tracing::info!(ticket = %run.ticket, url = %pr.url, "pull request opened");
        self.events.dispatch(&PipelineEvent::PullRequestOpened {
            run_id: run.id,
            ticket: run.ticket.to_string(),
            url: pr.url.clone(),
            timestamp: Utc::now(),
        });

        if let Err(e) = self.tracker.update_issue(run.ticket, &pr.url).await {
            run.advisory_failed("link pull request", e.to_string());
        }

        run.enter(PipelineState::MarkingInReview);
        self.mark_status(run, &self.options.in_review_status).await;

        run.enter(PipelineState::Succeeded);
        Ok(Completion::PullRequest(pr.url))
    }

    /// Run tests, asking the agent for fixes until they pass or the
    /// attempt budget runs out. Returns the number of fix cycles used.
    async fn test_with_retry(
        &self,
        run: &mut Run<'_>,
        issue: &TaskIssue,
        context: &AgentContext,
    ) -> Result<u32, PipelineError> {
        let mut retry = RetryState::new(self.options.max_test_attempts);
        run.enter(PipelineState::Testing { attempt: 0 });

        loop {
            let outcome = self
                .tests
                .run(&context.working_directory)
                .await
                .map_err(|e| match e {
                    TestRunError::ProjectTypeUnknown(dir) => {
                        PipelineError::ProjectTypeUnknown(dir.display().to_string())
                    }
                    other => PipelineError::TestExecutionFailed(other.to_string()),
                })?;

            self.events.dispatch(&PipelineEvent::TestRunCompleted {
                run_id: run.id,
                ticket: run.ticket.to_string(),
                attempt: retry.attempt,
                passed: outcome.passed,
                timestamp: Utc::now(),
            });
            if outcome.passed {
                return Ok(retry.attempt);
            }
            retry.record_failure(outcome.output);

            let Some(handle) = run.session.clone() else {
                tracing::warn!(ticket = %run.ticket, "tests failed and the agent session cannot be continued");
                return Err(exhausted(&retry));
            };
            if !retry.can_retry() {
                return Err(exhausted(&retry));
            }

            tracing::info!(
                ticket = %run.ticket,
                attempt = retry.attempt + 1,
                max = retry.max_attempts,
                "tests failed, asking agent for a fix"
            );
            let fix_prompt = prompt::fix_prompt(
                issue,
                retry.last_error.as_deref().unwrap_or_default(),
                retry.attempt,
                retry.max_attempts,
            );
            let fix = self
                .call_agent(run.ticket, AgentCall::Continue(&handle), &fix_prompt, context)
                .await?;
            if let Some(next) = fix.session_handle {
                run.session = Some(next);
            }

            retry.advance();
            run.enter(PipelineState::Testing {
                attempt: retry.attempt,
            });
        }
    }

    /// Invoke the agent, retrying once after a backoff if the failure is
    /// marked retryable.
    async fn call_agent(
        &self,
        ticket: &str,
        call: AgentCall<'_>,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<AgentResult, PipelineError> {
        let error = match self.invoke_agent(call, prompt, context).await {
            Ok(result) => return Ok(result),
            Err(error) => error,
        };
        if !error.is_retryable() {
            return Err(agent_failure(error));
        }

        let wait = error
            .retry_after()
            .unwrap_or(DEFAULT_AGENT_BACKOFF)
            .min(self.options.agent_retry_cap);
        tracing::warn!(
            ticket = %ticket,
            wait_ms = wait.as_millis() as u64,
            "agent failed transiently, retrying once: {}",
            error
        );
        tokio::time::sleep(wait).await;

        self.invoke_agent(call, prompt, context)
            .await
            .map_err(agent_failure)
    }

    async fn invoke_agent(
        &self,
        call: AgentCall<'_>,
        prompt: &str,
        context: &AgentContext,
    ) -> Result<AgentResult, AgentError> {
        match call {
            AgentCall::Start => self.agent.start(prompt, context).await,
            AgentCall::Continue(handle) => {
                self.agent.continue_session(handle, prompt, context).await
            }
        }
    }

    fn agent_context(&self, ticket: &str, dir: &Path) -> AgentContext {
        let ticket = ticket.to_string();
        AgentContext::new(dir)
            .with_timeout(self.options.agent_timeout)
            .with_observer(Arc::new(move |line: &str| {
                tracing::debug!(ticket = %ticket, "agent: {}", line);
            }))
    }

    /// Best-effort status change; failures are warnings only.
    async fn mark_status(&self, run: &Run<'_>, status: &str) {
        if status.trim().is_empty() {
            return;
        }
        match self.tracker.change_status(run.ticket, status).await {
            Ok(()) => tracing::debug!(ticket = %run.ticket, status = %status, "issue status updated"),
            Err(e) if e.is_advisory_status_error() => {
                tracing::info!(ticket = %run.ticket, "skipping status update: {}", e)
            }
            Err(e) => run.advisory_failed(&format!("set status '{}'", status), e.to_string()),
        }
    }
}

#[async_trait]
impl PipelineRunner for Pipeline {
    async fn run(&self, ticket: &str) -> PipelineReport {
        self.execute(ticket).await
    }
}

fn exhausted(retry: &RetryState) -> PipelineError {
    PipelineError::TestsExhausted {
        attempts: retry.attempt,
        last_output: retry.last_error.clone().unwrap_or_default(),
    }
}

fn agent_failure(error: AgentError) -> PipelineError {
    match error {
        AgentError::ExecutionFailed { message, .. } => PipelineError::AgentExecutionFailed(message),
        other => PipelineError::AgentExecutionFailed(other.to_string()),
    }
}
