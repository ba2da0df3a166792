//! # tp-pipeline
//!
//! Ticket → pull request pipelines and the scheduler that runs many of them.
//!
//! A [`Pipeline`] takes one ticket through a fixed sequence of states:
//! fetch the issue, mark it in progress, provision a worktree, let the agent
//! implement it, run tests with bounded fix-and-retry, commit and push, open
//! a PR, and mark the issue in review. The worktree is torn down on every
//! exit path unless the caller asks to keep it.
//!
//! The [`Scheduler`] runs pipelines for a list of tickets with at most
//! `max_concurrent` in flight, starting the next ticket as soon as any slot
//! frees up, and always returns a [`Summary`].
//!
//! ## Key components
//!
//! - [`PipelineState`] — the per-ticket state machine
//! - [`RetryState`] — the test-run-and-fix loop counter
//! - [`TestRunner`] / [`CommandTestRunner`] — project detection + test runs
//! - [`PipelineResult`] / [`PipelineReport`] — one terminal outcome per ticket
//! - [`ResultAggregator`] / [`Summary`] — collected outcomes and the report
//! - [`PipelineEvent`] / [`EventDispatcher`] — lifecycle notifications

pub mod error;
pub mod events;
pub mod pipeline;
pub mod prompt;
pub mod result;
pub mod retry;
pub mod scheduler;
pub mod state;
pub mod test_runner;

pub use error::PipelineError;
pub use events::{EventDispatcher, LogSink, NotificationSink, PipelineEvent};
pub use pipeline::{Pipeline, PipelineOptions, PipelineRunner};
pub use result::{ActivePipeline, PipelineReport, PipelineResult, ResultAggregator, Summary};
pub use retry::RetryState;
pub use scheduler::Scheduler;
pub use state::PipelineState;
pub use test_runner::{CommandTestRunner, ProjectKind, TestOutcome, TestRunError, TestRunner};
