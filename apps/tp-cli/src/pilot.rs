// pilot.rs — Build the collaborators a command needs from config + flags.
//
// One `Pilot` per process. It owns the tracker, source host, agent, and
// test runner, and hands out `Pipeline`s sharing them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tp_agent::{AgentLaunchConfig, AgentSession, CliAgent, SessionRecord, SessionStore};
use tp_pipeline::{CommandTestRunner, EventDispatcher, LogSink, Pipeline, PipelineOptions, PipelineReport};
use tp_submit::{GitHubCliHost, SourceHost};
use tp_tracker::{LocalTracker, TaskTracker};
use tp_workspace::WorktreeProvisioner;

use crate::config::{PilotConfig, ProjectLayout};
use crate::progress::ProgressSink;

/// Flags shared by `tp run` and `tp parallel`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunFlags {
    /// Skip the test-and-fix loop.
    #[arg(long)]
    pub skip_tests: bool,
    /// Open pull requests as drafts.
    #[arg(long)]
    pub draft: bool,
    /// Print what would happen without provisioning or calling the agent.
    #[arg(long)]
    pub dry_run: bool,
    /// Fix-and-retest cycles after the first failing test run.
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Agent to use (claude-code, codex, or an executable name).
    #[arg(long)]
    pub agent: Option<String>,
    /// Base branch for new work and PRs.
    #[arg(long)]
    pub base: Option<String>,
}

/// One line of pre-flight output.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

pub struct Pilot {
    pub layout: ProjectLayout,
    pub config: PilotConfig,
    pub tracker: Arc<dyn TaskTracker>,
    pub host: Arc<dyn SourceHost>,
    pub agent: Arc<CliAgent>,
    pub tests: Arc<CommandTestRunner>,
}

impl Pilot {
    /// Wire up collaborators. `agent_override` replaces `[agent] kind`.
    pub fn new(
        layout: ProjectLayout,
        config: PilotConfig,
        agent_override: Option<&str>,
    ) -> anyhow::Result<Self> {
        let tracker: Arc<dyn TaskTracker> = match config.tracker.kind.as_str() {
            "local" => {
                let dir = config.tickets_dir(&layout);
                let base_url = config
                    .tracker
                    .base_url
                    .clone()
                    .unwrap_or_else(|| format!("file://{}", dir.display()));
                let tracker = LocalTracker::new(&dir, base_url)
                    .with_context(|| format!("cannot open ticket directory {}", dir.display()))?
                    .with_statuses(config.tracker.statuses.clone());
                Arc::new(tracker)
            }
            other => bail!("unsupported tracker kind '{}' (supported: local)", other),
        };

        let host: Arc<dyn SourceHost> = Arc::new(GitHubCliHost::from_config(&config.submit));

        let agent_kind = agent_override.unwrap_or(&config.agent.kind);
        let mut launch = AgentLaunchConfig::for_agent(agent_kind);
        // A command override only applies to the configured agent.
        if agent_override.is_none() || agent_override == Some(config.agent.kind.as_str()) {
            if let Some(command) = &config.agent.command {
                launch = launch.with_command(command.clone());
            }
        }
        let agent = Arc::new(CliAgent::new(launch));

        let tests = Arc::new(
            CommandTestRunner::new()
                .with_command(config.tests.command.clone())
                .with_timeout(Duration::from_secs(config.tests.timeout_secs)),
        );

        Ok(Self {
            layout,
            config,
            tracker,
            host,
            agent,
            tests,
        })
    }

    /// Pipeline options: config values overridden by flags.
    pub fn options(&self, flags: &RunFlags, keep_workspace: bool) -> PipelineOptions {
        let mut options = PipelineOptions::new(self.layout.root.clone());
        options.base_branch = flags
            .base
            .clone()
            .unwrap_or_else(|| self.config.submit.base_branch.clone());
        options.max_test_attempts = flags.max_attempts.unwrap_or(self.config.tests.max_attempts);
        options.skip_tests = flags.skip_tests || self.config.tests.skip;
        options.draft = flags.draft || self.config.submit.draft;
        options.keep_workspace = keep_workspace;
        options.in_progress_status = self.config.tracker.in_progress_status.clone();
        options.in_review_status = self.config.tracker.in_review_status.clone();
        options.agent_timeout = Duration::from_secs(self.config.agent.timeout_secs);
        options.pr_template = self.config.pr_template(&self.layout);
        options
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.config.worktrees_dir(&self.layout)
    }

    /// A pipeline over the shared collaborators, logging events to
    /// `.tp/events.jsonl` and progress lines to stdout.
    pub fn pipeline(&self, options: PipelineOptions) -> Pipeline {
        let provisioner = WorktreeProvisioner::new(self.host.clone(), self.worktrees_dir())
            .with_branch_prefix(self.config.submit.branch_prefix.clone());

        let mut events = EventDispatcher::new();
        events.add_sink(Box::new(LogSink::new(&self.layout.events_log)));
        events.add_sink(Box::new(ProgressSink::new()));

        Pipeline::new(
            self.tracker.clone(),
            self.host.clone(),
            self.agent.clone(),
            self.tests.clone(),
            provisioner,
            options,
        )
        .with_events(Arc::new(events))
    }

    /// Tool and environment checks run before any pipeline starts.
    pub fn preflight(&self) -> Vec<Check> {
        let mut checks = Vec::new();

        let agent_config = self.agent.config();
        checks.push(Check {
            name: format!("agent ({})", self.agent.name()),
            ok: self.agent.is_available(),
            detail: match which::which(&agent_config.command) {
                Ok(path) => path.display().to_string(),
                Err(_) => format!("`{}` not found on PATH", agent_config.command),
            },
        });

        for tool in ["git", "gh"] {
            let found = which::which(tool);
            checks.push(Check {
                name: tool.to_string(),
                ok: found.is_ok(),
                detail: match found {
                    Ok(path) => path.display().to_string(),
                    Err(_) => format!("`{}` not found on PATH", tool),
                },
            });
        }

        let git_dir = self.layout.root.join(".git");
        checks.push(Check {
            name: "repository".to_string(),
            ok: git_dir.exists(),
            detail: if git_dir.exists() {
                self.layout.root.display().to_string()
            } else {
                format!("{} is not a git repository", self.layout.root.display())
            },
        });

        checks
    }

    /// Fail unless every pre-flight check passes.
    pub fn require_preflight(&self) -> anyhow::Result<()> {
        let failed: Vec<_> = self.preflight().into_iter().filter(|c| !c.ok).collect();
        if failed.is_empty() {
            return Ok(());
        }
        for check in &failed {
            eprintln!("  ✗ {}: {}", check.name, check.detail);
        }
        bail!(
            "pre-flight checks failed ({}); run `tp check` for details",
            failed
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    /// Remember which agent session produced a report, if any.
    pub fn record_session(&self, report: &PipelineReport) {
        let Some(handle) = &report.session_handle else {
            return;
        };
        let mut record = SessionRecord::new(&report.ticket, self.agent.name(), handle);
        record.branch = report.branch.clone();
        record.pr_url = report.result.pr_url().map(str::to_string);

        let saved = SessionStore::new(&self.layout.sessions_dir).and_then(|store| store.save(&record));
        if let Err(e) = saved {
            tracing::warn!(ticket = %report.ticket, "failed to save session record: {}", e);
        }
    }
}
