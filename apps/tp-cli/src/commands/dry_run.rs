// dry_run.rs — Describe what a pipeline would do without doing it.
//
// Only the tracker is read. Nothing is provisioned, no agent runs, nothing
// is committed and GitHub is never called.

use std::fmt::Write;

use anyhow::Context;
use tp_pipeline::prompt::implementation_prompt;
use tp_pipeline::PipelineOptions;
use tp_tracker::TaskTracker;
use tp_workspace::WorktreeProvisioner;

use crate::pilot::Pilot;

/// Render the plan for one ticket.
pub async fn plan(pilot: &Pilot, ticket: &str, options: &PipelineOptions) -> anyhow::Result<String> {
    let issue = pilot
        .tracker
        .fetch_issue(ticket)
        .await
        .with_context(|| format!("cannot fetch {}", ticket))?;
    let link = pilot.tracker.issue_link(&issue.id);

    let provisioner = WorktreeProvisioner::new(pilot.host.clone(), pilot.worktrees_dir())
        .with_branch_prefix(pilot.config.submit.branch_prefix.clone());
    let branch = provisioner.branch_for(&issue.id);

    let tests = if options.skip_tests {
        "skipped".to_string()
    } else {
        let command = pilot
            .tests
            .describe(&options.repo_root)
            .unwrap_or_else(|| "none detected (pipeline would fail)".to_string());
        format!(
            "{} (up to {} fix attempt(s))",
            command, options.max_test_attempts
        )
    };

    let mut out = String::new();
    let _ = writeln!(out, "Dry run for {}: {}", issue.id, issue.title);
    let _ = writeln!(out, "  Link:     {}", link);
    let _ = writeln!(out, "  Branch:   {}", branch);
    let _ = writeln!(out, "  Base:     {}", options.base_branch);
    let _ = writeln!(out, "  Worktree: {}/{}-<random>", pilot.worktrees_dir().display(), branch);
    let _ = writeln!(out, "  Agent:    {}", pilot.agent.config().agent_id);
    let _ = writeln!(out, "  Tests:    {}", tests);
    let _ = writeln!(out, "  PR:       {}", if options.draft { "draft" } else { "ready for review" });

    let mut steps = Vec::new();
    if !options.in_progress_status.is_empty() {
        steps.push(format!("mark issue '{}'", options.in_progress_status));
    }
    steps.push("provision worktree".to_string());
    steps.push("agent implements the ticket".to_string());
    if !options.skip_tests {
        steps.push("run tests, asking the agent to fix failures".to_string());
    }
    steps.push("commit and push".to_string());
    steps.push(format!("open pull request against {}", options.base_branch));
    steps.push("link the pull request on the issue".to_string());
    if !options.in_review_status.is_empty() {
        steps.push(format!("mark issue '{}'", options.in_review_status));
    }
    steps.push("remove worktree".to_string());

    let _ = writeln!(out, "\nSteps:");
    for (i, step) in steps.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, step);
    }

    let _ = writeln!(out, "\nPrompt:");
    for line in implementation_prompt(&issue, &link).lines() {
        let _ = writeln!(out, "  {}", line);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PilotConfig, ProjectLayout};
    use crate::pilot::RunFlags;
    use tempfile::tempdir;
    use tp_tracker::{LocalTicket, LocalTracker};

    fn pilot_with_ticket(dir: &std::path::Path) -> Pilot {
        let layout = ProjectLayout::for_project(dir);
        let tracker = LocalTracker::new(&layout.tickets_dir, "https://tracker.example/browse").unwrap();
        let mut ticket = LocalTicket::new("IOS-42", "Add dark mode toggle");
        ticket.description = Some("Settings screen needs a toggle.".to_string());
        tracker.save(&ticket).unwrap();

        let mut config = PilotConfig::default();
        config.tracker.base_url = Some("https://tracker.example/browse".to_string());
        config.tests.command = Some("make check".to_string());
        Pilot::new(layout, config, None).unwrap()
    }

    #[tokio::test]
    async fn plan_lists_branch_tests_and_prompt() {
        let dir = tempdir().unwrap();
        let pilot = pilot_with_ticket(dir.path());
        let options = pilot.options(&RunFlags::default(), false);

        let text = plan(&pilot, "IOS-42", &options).await.unwrap();
        assert!(text.contains("Dry run for IOS-42: Add dark mode toggle"));
        assert!(text.contains("Branch:   ios-42"));
        assert!(text.contains("Base:     main"));
        assert!(text.contains("make check (up to 3 fix attempt(s))"));
        assert!(text.contains("run tests"));
        assert!(text.contains("https://tracker.example/browse/IOS-42"));
        assert!(text.contains("Settings screen needs a toggle."));

        // Nothing was provisioned.
        assert!(!pilot.worktrees_dir().exists() || std::fs::read_dir(pilot.worktrees_dir()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn skipped_tests_drop_the_test_step() {
        let dir = tempdir().unwrap();
        let pilot = pilot_with_ticket(dir.path());
        let flags = RunFlags {
            skip_tests: true,
            draft: true,
            ..Default::default()
        };
        let options = pilot.options(&flags, false);

        let text = plan(&pilot, "IOS-42", &options).await.unwrap();
        assert!(text.contains("Tests:    skipped"));
        assert!(text.contains("PR:       draft"));
        assert!(!text.contains("run tests"));
    }

    #[tokio::test]
    async fn unknown_ticket_is_an_error() {
        let dir = tempdir().unwrap();
        let pilot = pilot_with_ticket(dir.path());
        let options = pilot.options(&RunFlags::default(), false);
        let err = plan(&pilot, "IOS-404", &options).await.unwrap_err();
        assert!(err.to_string().contains("cannot fetch IOS-404"));
    }
}
