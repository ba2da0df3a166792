//! # tp-workspace
//!
//! Isolated per-ticket workspaces for ticket-pilot.
//!
//! Every pipeline gets its own git worktree, checked out on a branch derived
//! from the ticket reference. Worktree directories carry a random suffix so
//! two runs never share a path, even for the same ticket.
//!
//! ## Key components
//!
//! - [`sanitize_branch_name`] — total, idempotent ticket → branch mapping
//! - [`WorktreeProvisioner`] — creates and tears down worktrees through a
//!   [`tp_submit::SourceHost`]
//! - [`Workspace`] — the provisioned directory and its branch

pub mod branch;
pub mod error;
pub mod provisioner;

pub use branch::{sanitize_branch_name, DEFAULT_BRANCH_TOKEN};
pub use error::WorkspaceError;
pub use provisioner::{Workspace, WorktreeProvisioner};
