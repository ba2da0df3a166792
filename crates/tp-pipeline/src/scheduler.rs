// scheduler.rs — Bounded sliding-window execution of many pipelines.
//
// Each ticket needs a semaphore permit before its pipeline is spawned, and
// the permit is released when that pipeline reports. The permit and the
// aggregator's active marker live in the spawned future, so a panicking
// pipeline releases both while unwinding. A slot freed by a fast
// ticket is immediately taken by the next queued one; there are no batches.
// Completion order is whatever the pipelines produce.
//
// There is no cancellation: once spawned, a pipeline runs to a terminal
// state and the scheduler waits for all of them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

use crate::error::PipelineError;
use crate::pipeline::PipelineRunner;
use crate::result::{PipelineReport, PipelineResult, ResultAggregator, Summary};

/// Runs pipelines for a list of tickets, at most `max_concurrent` at once.
pub struct Scheduler {
    max_concurrent: usize,
}

impl Scheduler {
    /// `max_concurrent` below 1 is raised to 1.
    pub fn new(max_concurrent: usize) -> Self {
        if max_concurrent == 0 {
            tracing::warn!("max_concurrent of 0 would never run anything; using 1");
        }
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run every ticket to a terminal state and summarize.
    ///
    /// Repeated tickets are run once. The summary lists tickets in
    /// submission order and always has exactly one entry per ticket.
    pub async fn execute(&self, tickets: &[String], runner: Arc<dyn PipelineRunner>) -> Summary {
        let started = Instant::now();
        let order = dedupe(tickets);
        let aggregator = Arc::new(ResultAggregator::new());
        let slots = Arc::new(Semaphore::new(self.max_concurrent));
        let mut join_set: JoinSet<()> = JoinSet::new();

        tracing::info!(
            tickets = order.len(),
            max_concurrent = self.max_concurrent,
            "scheduler started"
        );

        for ticket in &order {
            let permit = match slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            while let Some(done) = join_set.try_join_next() {
                reap(done);
            }

            let active = aggregator.pipeline_started();
            tracing::debug!(ticket = %ticket, active = aggregator.active(), "dispatching pipeline");

            let runner = runner.clone();
            let aggregator = aggregator.clone();
            let ticket = ticket.clone();
            join_set.spawn(async move {
                let report = runner.run(&ticket).await;
                aggregator.record(report);
                drop(active);
                drop(permit);
            });
        }

        while let Some(done) = join_set.join_next().await {
            reap(done);
        }

        for ticket in &order {
            if !aggregator.contains(ticket) {
                aggregator.record(PipelineReport::new(
                    ticket.clone(),
                    PipelineResult::Failure {
                        error: PipelineError::Aborted("pipeline task ended without a result".to_string()),
                        duration: Duration::ZERO,
                    },
                ));
            }
        }

        let summary = aggregator.summary(&order, started.elapsed());
        tracing::info!(
            succeeded = summary.succeeded(),
            no_changes = summary.no_changes(),
            failed = summary.failed(),
            peak_concurrency = summary.peak_concurrency,
            "scheduler finished"
        );
        summary
    }
}

fn reap(done: Result<(), JoinError>) {
    if let Err(e) = done {
        tracing::error!("pipeline task failed: {}", e);
    }
}

/// Drop repeated tickets, keeping first occurrences in order.
fn dedupe(tickets: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tickets
        .iter()
        .filter(|t| {
            let fresh = seen.insert(t.as_str());
            if !fresh {
                tracing::warn!(ticket = %t, "ticket listed more than once; running it once");
            }
            fresh
        })
        .cloned()
        .collect()
}
