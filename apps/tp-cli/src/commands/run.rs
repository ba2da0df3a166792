// run.rs — `tp run <ticket>`: one ticket from issue to pull request.

use tp_pipeline::{PipelineError, PipelineResult};

use crate::commands::dry_run;
use crate::config::{PilotConfig, ProjectLayout};
use crate::pilot::{Pilot, RunFlags};

/// Lines of failing test output echoed when the fix budget runs out.
const FAILURE_TAIL_LINES: usize = 30;

pub fn execute(
    layout: ProjectLayout,
    config: PilotConfig,
    ticket: &str,
    flags: &RunFlags,
    keep_worktree: bool,
) -> anyhow::Result<()> {
    let pilot = Pilot::new(layout, config, flags.agent.as_deref())?;
    let options = pilot.options(flags, keep_worktree);
    let rt = tokio::runtime::Runtime::new()?;

    if flags.dry_run {
        let text = rt.block_on(dry_run::plan(&pilot, ticket, &options))?;
        print!("{}", text);
        return Ok(());
    }

    pilot.require_preflight()?;

    let pipeline = pilot.pipeline(options);
    let report = rt.block_on(pipeline.execute(ticket));
    pilot.record_session(&report);

    if let Some(path) = &report.kept_workspace {
        println!("Worktree kept at {}", path.display());
    }

    match &report.result {
        PipelineResult::Success { pr_url, .. } => {
            println!("\n{} done: {}", report.ticket, pr_url);
            Ok(())
        }
        PipelineResult::NoChanges { .. } => {
            println!("\n{}: the agent made no changes; nothing to submit.", report.ticket);
            Ok(())
        }
        PipelineResult::Failure { error, .. } => {
            if let PipelineError::TestsExhausted { last_output, .. } = error {
                eprintln!("\nLast test output:");
                eprintln!("{}", tail_lines(last_output, FAILURE_TAIL_LINES));
            }
            anyhow::bail!("{} failed: {}", report.ticket, error)
        }
    }
}

/// The last `n` lines of `text`.
fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
