//! Source host adapters for ticket-pilot
//!
//! This crate provides the `SourceHost` abstraction a pipeline uses for every
//! repository side effect: creating and removing worktrees, committing and
//! pushing a branch, and opening a pull request. The built-in implementation
//! shells out to `git` and the GitHub CLI (`gh`).

pub mod body;
pub mod config;
pub mod git;
pub mod host;

pub use body::PrBodyContext;
pub use config::SubmitConfig;
pub use git::GitHubCliHost;
pub use host::{PullRequest, PullRequestParams, Result, SourceHost, SubmitError};
