// result.rs — Per-ticket outcomes, their collection, and the final summary.
//
// Each pipeline produces exactly one PipelineReport at its terminal
// transition. The ResultAggregator is shared by all running pipelines of a
// scheduler run; its state is only touched at pipeline start and finish.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PipelineError;

/// Terminal outcome of one pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    /// A pull request was opened.
    Success { pr_url: String, duration: Duration },
    /// The agent produced no diff; nothing was submitted.
    NoChanges { duration: Duration },
    Failure {
        error: PipelineError,
        duration: Duration,
    },
}

impl PipelineResult {
    /// Elapsed time of the pipeline that produced this result.
    pub fn duration(&self) -> Duration {
        match self {
            PipelineResult::Success { duration, .. }
            | PipelineResult::NoChanges { duration }
            | PipelineResult::Failure { duration, .. } => *duration,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineResult::Failure { .. })
    }

    pub fn pr_url(&self) -> Option<&str> {
        match self {
            PipelineResult::Success { pr_url, .. } => Some(pr_url),
            _ => None,
        }
    }

    /// Short outcome label for tables and events.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineResult::Success { .. } => "SUCCESS",
            PipelineResult::NoChanges { .. } => "NO CHANGES",
            PipelineResult::Failure { .. } => "FAILED",
        }
    }

    /// PR URL, or the error, or a note that nothing changed.
    pub fn detail(&self) -> String {
        match self {
            PipelineResult::Success { pr_url, .. } => pr_url.clone(),
            PipelineResult::NoChanges { .. } => "agent made no changes".to_string(),
            PipelineResult::Failure { error, .. } => error.to_string(),
        }
    }
}

/// A pipeline's result plus what it left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub ticket: String,
    pub result: PipelineResult,
    /// Branch the work was done on, once provisioning succeeded.
    pub branch: Option<String>,
    /// Last agent session handle, for resuming the conversation later.
    pub session_handle: Option<String>,
    /// Worktree left on disk because preservation was requested.
    pub kept_workspace: Option<PathBuf>,
}

impl PipelineReport {
    pub fn new(ticket: impl Into<String>, result: PipelineResult) -> Self {
        Self {
            ticket: ticket.into(),
            result,
            branch: None,
            session_handle: None,
            kept_workspace: None,
        }
    }
}

#[derive(Default)]
struct AggregatorState {
    results: HashMap<String, PipelineReport>,
    active: usize,
    peak_active: usize,
}

/// Thread-safe collection of pipeline reports keyed by ticket.
#[derive(Default)]
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Note that a pipeline began running. It counts as active until the
    /// returned guard is dropped, even if the pipeline panics.
    pub fn pipeline_started(self: &Arc<Self>) -> ActivePipeline {
        let mut state = self.lock();
        state.active += 1;
        state.peak_active = state.peak_active.max(state.active);
        ActivePipeline {
            aggregator: self.clone(),
        }
    }

    fn pipeline_ended(&self) {
        let mut state = self.lock();
        state.active = state.active.saturating_sub(1);
    }

    /// Record a terminal report. A second report for the same ticket
    /// replaces the first.
    pub fn record(&self, report: PipelineReport) {
        let mut state = self.lock();
        if let Some(previous) = state.results.insert(report.ticket.clone(), report) {
            tracing::warn!(ticket = %previous.ticket, "replacing earlier result for ticket");
        }
    }

    /// Pipelines currently running.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Most pipelines ever running at once.
    pub fn peak_active(&self) -> usize {
        self.lock().peak_active
    }

    pub fn len(&self) -> usize {
        self.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, ticket: &str) -> bool {
        self.lock().results.contains_key(ticket)
    }

    /// Build the summary, listing tickets in `order`.
    pub fn summary(&self, order: &[String], wall_clock: Duration) -> Summary {
        let state = self.lock();
        let entries = order
            .iter()
            .filter_map(|ticket| state.results.get(ticket).cloned())
            .collect();
        Summary {
            entries,
            wall_clock,
            peak_concurrency: state.peak_active,
        }
    }
}

/// Marks one running pipeline; dropping it ends the pipeline's slot in the
/// active count.
pub struct ActivePipeline {
    aggregator: Arc<ResultAggregator>,
}

impl Drop for ActivePipeline {
    fn drop(&mut self) {
        self.aggregator.pipeline_ended();
    }
}

/// Final report of a scheduler run.
#[derive(Debug, Clone)]
pub struct Summary {
    /// One report per ticket, in submission order.
    pub entries: Vec<PipelineReport>,
    /// Elapsed time of the whole run.
    pub wall_clock: Duration,
    pub peak_concurrency: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_success()).count()
    }

    pub fn no_changes(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.result, PipelineResult::NoChanges { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_failure()).count()
    }

    /// Sum of per-pipeline durations. Exceeds wall clock time when
    /// pipelines overlap.
    pub fn total_duration(&self) -> Duration {
        self.entries.iter().map(|e| e.result.duration()).sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn get(&self, ticket: &str) -> Option<&PipelineReport> {
        self.entries.iter().find(|e| e.ticket == ticket)
    }

    /// Plain-text table of all results plus totals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<16} {:<11} {:>9}  DETAIL",
            "TICKET", "RESULT", "DURATION"
        );
        let _ = writeln!(out, "{}", "-".repeat(80));
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:<16} {:<11} {:>9}  {}",
                truncate(&entry.ticket, 16),
                entry.result.label(),
                format_duration(entry.result.duration()),
                truncate(&entry.result.detail(), 120),
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} ticket(s): {} succeeded, {} no changes, {} failed",
            self.total(),
            self.succeeded(),
            self.no_changes(),
            self.failed()
        );
        let _ = writeln!(
            out,
            "Total pipeline time: {} (wall clock {})",
            format_duration(self.total_duration()),
            format_duration(self.wall_clock)
        );
        out
    }
}

/// Human-readable duration: `4.2s`, `3m 07s`, `1h 02m`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn success(ticket: &str, n: u64) -> PipelineReport {
        PipelineReport::new(
            ticket,
            PipelineResult::Success {
                pr_url: format!("https://github.com/acme/app/pull/{}", n),
                duration: secs(n),
            },
        )
    }

    #[test]
    fn total_duration_is_the_sum_not_wall_clock() {
        let agg = ResultAggregator::new();
        agg.record(success("IOS-1", 30));
        agg.record(success("IOS-2", 45));
        agg.record(PipelineReport::new(
            "IOS-3",
            PipelineResult::Failure {
                error: PipelineError::IssueNotFound("IOS-3".to_string()),
                duration: secs(5),
            },
        ));

        let order: Vec<String> = ["IOS-1", "IOS-2", "IOS-3"].map(String::from).to_vec();
        let summary = agg.summary(&order, secs(50));
        assert_eq!(summary.total_duration(), secs(80));
        assert_eq!(summary.wall_clock, secs(50));
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(summary.has_failures());
    }

    #[test]
    fn duplicate_ticket_overwrites() {
        let agg = ResultAggregator::new();
        agg.record(success("IOS-1", 1));
        agg.record(success("IOS-1", 2));
        assert_eq!(agg.len(), 1);

        let summary = agg.summary(&["IOS-1".to_string()], secs(2));
        assert_eq!(summary.total_duration(), secs(2));
    }

    #[test]
    fn summary_follows_submission_order() {
        let agg = ResultAggregator::new();
        agg.record(success("B", 1));
        agg.record(success("A", 1));
        let summary = agg.summary(&["A".to_string(), "B".to_string()], secs(1));
        let tickets: Vec<_> = summary.entries.iter().map(|e| e.ticket.as_str()).collect();
        assert_eq!(tickets, vec!["A", "B"]);
    }

    #[test]
    fn tracks_peak_concurrency() {
        let agg = Arc::new(ResultAggregator::new());
        let a = agg.pipeline_started();
        let _b = agg.pipeline_started();
        agg.record(success("A", 1));
        assert_eq!(agg.active(), 2);
        drop(a);
        let _c = agg.pipeline_started();
        assert_eq!(agg.active(), 2);
        assert_eq!(agg.peak_active(), 2);
    }

    #[test]
    fn unwinding_pipeline_releases_its_slot() {
        let agg = Arc::new(ResultAggregator::new());
        let shared = agg.clone();
        let outcome = std::thread::spawn(move || {
            let _active = shared.pipeline_started();
            panic!("pipeline blew up");
        })
        .join();
        assert!(outcome.is_err());
        assert_eq!(agg.active(), 0);

        let _next = agg.pipeline_started();
        assert_eq!(agg.peak_active(), 1);
    }

    #[test]
    fn no_changes_is_not_a_failure() {
        let agg = ResultAggregator::new();
        agg.record(PipelineReport::new(
            "IOS-9",
            PipelineResult::NoChanges { duration: secs(3) },
        ));
        let summary = agg.summary(&["IOS-9".to_string()], secs(3));
        assert_eq!(summary.no_changes(), 1);
        assert!(!summary.has_failures());
    }

    #[test]
    fn render_lists_every_ticket_and_totals() {
        let agg = ResultAggregator::new();
        agg.record(success("IOS-1", 65));
        agg.record(PipelineReport::new(
            "IOS-2",
            PipelineResult::Failure {
                error: PipelineError::PrCreationFailed("gh: auth required".to_string()),
                duration: secs(10),
            },
        ));
        let summary = agg.summary(&["IOS-1".to_string(), "IOS-2".to_string()], secs(70));
        let table = summary.render();

        assert!(table.contains("https://github.com/acme/app/pull/65"));
        assert!(table.contains("gh: auth required"));
        assert!(table.contains("2 ticket(s): 1 succeeded, 0 no changes, 1 failed"));
        assert!(table.contains("Total pipeline time: 1m 15s (wall clock 1m 10s)"));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(secs(187)), "3m 07s");
        assert_eq!(format_duration(secs(3720)), "1h 02m");
    }
}
