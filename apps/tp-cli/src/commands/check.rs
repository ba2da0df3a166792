// check.rs — `tp check`: is this machine ready to run pipelines?

use crate::config::{PilotConfig, ProjectLayout};
use crate::pilot::Pilot;

pub fn execute(
    layout: ProjectLayout,
    config: PilotConfig,
    agent: Option<&str>,
) -> anyhow::Result<()> {
    let pilot = Pilot::new(layout, config, agent)?;
    let checks = pilot.preflight();

    for check in &checks {
        let mark = if check.ok { "✓" } else { "✗" };
        println!("  {} {:<24} {}", mark, check.name, check.detail);
    }

    let tests = pilot
        .tests
        .describe(&pilot.layout.root)
        .unwrap_or_else(|| "none detected".to_string());
    println!("    {:<24} {}", "test command", tests);
    println!("    {:<24} {}", "worktrees", pilot.worktrees_dir().display());

    let failed = checks.iter().filter(|c| !c.ok).count();
    if failed > 0 {
        anyhow::bail!("{} check(s) failed", failed);
    }
    println!("\nReady.");
    Ok(())
}
