// parallel.rs — `tp parallel`: many tickets, at most N pipelines at once.
//
// Tickets come from positional arguments and/or a list file. Every ticket
// runs in its own worktree; one failure never stops the others. The exit
// code is non-zero only when some ticket failed.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tp_pipeline::Scheduler;

use crate::commands::dry_run;
use crate::config::{PilotConfig, ProjectLayout};
use crate::pilot::{Pilot, RunFlags};

pub fn execute(
    layout: ProjectLayout,
    config: PilotConfig,
    tickets: &[String],
    file: Option<&Path>,
    max_concurrent: Option<usize>,
    flags: &RunFlags,
    keep_worktrees: bool,
) -> anyhow::Result<()> {
    let file_tickets = match file {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read ticket file {}", path.display()))?;
            parse_ticket_list(&content)
        }
        None => Vec::new(),
    };
    let tickets = merge_tickets(tickets, &file_tickets);
    if tickets.is_empty() {
        anyhow::bail!("no tickets given; pass ticket ids or --file <path>");
    }

    let pilot = Pilot::new(layout, config, flags.agent.as_deref())?;
    let options = pilot.options(flags, keep_worktrees);
    let rt = tokio::runtime::Runtime::new()?;

    if flags.dry_run {
        for ticket in &tickets {
            match rt.block_on(dry_run::plan(&pilot, ticket, &options)) {
                Ok(text) => println!("{}", text),
                Err(e) => println!("{}: {:#}\n", ticket, e),
            }
        }
        return Ok(());
    }

    pilot.require_preflight()?;

    let max = max_concurrent.unwrap_or(pilot.config.parallel.max_concurrent);
    let scheduler = Scheduler::new(max);
    println!(
        "Running {} ticket(s), up to {} at a time.\n",
        tickets.len(),
        scheduler.max_concurrent()
    );

    let pipeline = Arc::new(pilot.pipeline(options));
    let summary = rt.block_on(scheduler.execute(&tickets, pipeline));

    for report in &summary.entries {
        pilot.record_session(report);
        if let Some(path) = &report.kept_workspace {
            println!("[{}] Worktree kept at {}", report.ticket, path.display());
        }
    }

    println!("\n{}", summary.render());

    if summary.has_failures() {
        anyhow::bail!("{} of {} ticket(s) failed", summary.failed(), summary.total());
    }
    Ok(())
}

/// Ticket ids from a list file: one per line, `#` starts a comment.
pub fn parse_ticket_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positional tickets first, then file tickets; first occurrence wins.
pub fn merge_tickets(positional: &[String], from_file: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    positional
        .iter()
        .chain(from_file)
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}
