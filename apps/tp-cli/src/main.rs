//! # tp
//!
//! Command-line interface for ticket-pilot.
//!
//! Takes tracker tickets through an AI coding agent and opens GitHub pull
//! requests:
//! - `tp run <ticket>` — one ticket, end to end
//! - `tp parallel <ticket>... [--file path]` — many tickets, bounded concurrency
//! - `tp check` — verify the agent, git, and gh are usable
//! - `tp sessions [ticket]` — agent sessions recorded by earlier runs

mod commands;
mod config;
mod pilot;
mod progress;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::{PilotConfig, ProjectLayout};
use pilot::RunFlags;

/// ticket-pilot — from tracker ticket to pull request.
#[derive(Parser)]
#[command(name = "tp", version, about)]
struct Cli {
    /// Project root directory (defaults to current directory).
    #[arg(long, default_value = ".", global = true)]
    project_root: PathBuf,

    /// Config file (defaults to .tp/config.toml, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one ticket from issue to pull request.
    Run {
        /// Ticket identifier (e.g., IOS-42).
        ticket: String,
        #[command(flatten)]
        flags: RunFlags,
        /// Leave the worktree on disk and print its path.
        #[arg(long)]
        keep_worktree: bool,
    },
    /// Run several tickets concurrently.
    Parallel {
        /// Ticket identifiers.
        tickets: Vec<String>,
        /// File with one ticket per line (`#` comments allowed).
        #[arg(long)]
        file: Option<PathBuf>,
        /// Pipelines allowed to run at once (default from config).
        #[arg(long)]
        max_concurrent: Option<usize>,
        #[command(flatten)]
        flags: RunFlags,
        /// Leave worktrees on disk and print their paths.
        #[arg(long)]
        keep_worktrees: bool,
    },
    /// Check that the agent, git, and gh are available.
    Check {
        /// Agent to check (defaults to the configured one).
        #[arg(long)]
        agent: Option<String>,
    },
    /// List recorded agent sessions.
    Sessions {
        /// Show a single ticket's session.
        ticket: Option<String>,
    },
}

/// Default directives: `tp` at info, library crates at warn, everything at
/// debug with `--verbose`.
fn default_directives(verbose: bool) -> String {
    let (app, libs) = if verbose { ("debug", "debug") } else { ("info", "warn") };
    std::iter::once(format!("tp={}", app))
        .chain(
            ["tp_pipeline", "tp_agent", "tp_submit", "tp_workspace", "tp_tracker"]
                .iter()
                .map(|krate| format!("{}={}", krate, libs)),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// A non-empty `RUST_LOG` replaces the defaults entirely.
fn log_filter(rust_log: Option<&str>, verbose: bool) -> anyhow::Result<EnvFilter> {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid RUST_LOG '{}'", directives)),
        None => Ok(EnvFilter::try_new(default_directives(verbose))?),
    }
}

fn init_tracing(verbose: bool, json: bool) -> anyhow::Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = log_filter(rust_log.as_deref(), verbose)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json)?;

    let project_root = cli.project_root.canonicalize().unwrap_or(cli.project_root);
    let layout = ProjectLayout::for_project(&project_root);
    let config = PilotConfig::load(&layout, cli.config.as_deref())?;

    match &cli.command {
        Commands::Run {
            ticket,
            flags,
            keep_worktree,
        } => commands::run::execute(layout, config, ticket, flags, *keep_worktree),
        Commands::Parallel {
            tickets,
            file,
            max_concurrent,
            flags,
            keep_worktrees,
        } => commands::parallel::execute(
            layout,
            config,
            tickets,
            file.as_deref(),
            *max_concurrent,
            flags,
            *keep_worktrees,
        ),
        Commands::Check { agent } => commands::check::execute(layout, config, agent.as_deref()),
        Commands::Sessions { ticket } => commands::sessions::execute(&layout, ticket.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_parse() {
        let quiet = default_directives(false);
        assert!(quiet.starts_with("tp=info,"));
        assert!(quiet.contains("tp_pipeline=warn"));
        assert!(EnvFilter::try_new(&quiet).is_ok());

        let verbose = default_directives(true);
        assert!(verbose.contains("tp=debug"));
        assert!(verbose.contains("tp_tracker=debug"));
        assert!(!verbose.contains("warn"));
    }

    #[test]
    fn rust_log_replaces_defaults() {
        let filter = log_filter(Some("tp_pipeline=trace"), false).unwrap();
        assert_eq!(filter.to_string(), "tp_pipeline=trace");

        let defaults = log_filter(None, false).unwrap().to_string();
        assert!(defaults.contains("tp_pipeline=warn"));
        assert!(log_filter(Some("  "), true).unwrap().to_string().contains("tp_pipeline=debug"));
    }
}
