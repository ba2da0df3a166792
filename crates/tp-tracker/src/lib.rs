//! # tp-tracker
//!
//! Task tracker contract for ticket-pilot.
//!
//! A pipeline only needs four things from a tracker: fetch an issue, move it
//! between statuses, attach a PR link, and a base URL for human links. The
//! [`TaskTracker`] trait captures exactly that, so JIRA, Linear, or a local
//! store can be swapped in at startup.
//!
//! ## Key components
//!
//! - [`TaskIssue`] — immutable snapshot of a ticket, fetched once per run
//! - [`TaskTracker`] — the async collaborator contract
//! - [`TrackerError`] — error taxonomy, including the advisory
//!   `InvalidStatus` subset that status transitions may ignore
//! - [`LocalTracker`] — JSON-file ticket store (one file per ticket)

pub mod error;
pub mod issue;
pub mod local;
pub mod tracker;

pub use error::TrackerError;
pub use issue::TaskIssue;
pub use local::{LocalTicket, LocalTracker};
pub use tracker::TaskTracker;
