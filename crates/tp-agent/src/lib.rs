//! # tp-agent
//!
//! AI coding agent sessions for ticket-pilot.
//!
//! An agent is an external executable (Claude Code, Codex, or a custom
//! command) that edits files in a working directory. This crate hides the
//! per-vendor flags behind a start/continue contract and reports failures
//! as typed errors; it never retries on its own.
//!
//! ## Key components
//!
//! - [`AgentSession`] — start / continue / is_available contract
//! - [`CliAgent`] — runs an agent executable described by an
//!   [`AgentLaunchConfig`]
//! - [`AgentError`] — execution failures (with retry hints) and
//!   non-continuable sessions
//! - [`SessionStore`] — JSON records linking tickets to session handles
//!   and pull requests

pub mod cli;
pub mod error;
pub mod launch;
pub mod session;
pub mod store;

pub use cli::CliAgent;
pub use error::AgentError;
pub use launch::{AgentLaunchConfig, OutputFormat};
pub use session::{AgentContext, AgentResult, AgentSession, OutputObserver, DEFAULT_AGENT_TIMEOUT};
pub use store::{SessionRecord, SessionStore};
