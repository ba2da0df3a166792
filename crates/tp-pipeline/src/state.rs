// state.rs — PipelineState: where a ticket is in its run.
//
// The state machine enforces a valid lifecycle:
//   Fetching → MarkingInProgress → Provisioning → Implementing
//     → Testing{0..} → Committing → OpeningPr → MarkingInReview → Succeeded
//   Implementing → Committing         (tests skipped)
//   Committing → NoChanges            (agent changed nothing)
//   (or Failed from any non-terminal state)

use std::fmt;

use serde::{Deserialize, Serialize};

/// The lifecycle state of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Fetching the issue from the tracker.
    Fetching,

    /// Moving the issue to "in progress" (advisory).
    MarkingInProgress,

    /// Creating the worktree and branch.
    Provisioning,

    /// The agent is implementing the ticket.
    Implementing,

    /// Running tests; `attempt` counts fix cycles completed so far.
    Testing { attempt: u32 },

    /// Staging, committing, and pushing.
    Committing,

    /// Opening the pull request.
    OpeningPr,

    /// Moving the issue to "in review" (advisory).
    MarkingInReview,

    /// Pull request opened.
    Succeeded,

    /// The agent made no changes; nothing to submit.
    NoChanges,

    /// The run failed.
    Failed { reason: String },
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Fetching => write!(f, "fetching"),
            PipelineState::MarkingInProgress => write!(f, "marking_in_progress"),
            PipelineState::Provisioning => write!(f, "provisioning"),
            PipelineState::Implementing => write!(f, "implementing"),
            PipelineState::Testing { .. } => write!(f, "testing"),
            PipelineState::Committing => write!(f, "committing"),
            PipelineState::OpeningPr => write!(f, "opening_pr"),
            PipelineState::MarkingInReview => write!(f, "marking_in_review"),
            PipelineState::Succeeded => write!(f, "succeeded"),
            PipelineState::NoChanges => write!(f, "no_changes"),
            PipelineState::Failed { .. } => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// Whether the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::NoChanges | PipelineState::Failed { .. }
        )
    }

    /// Check whether transitioning from this state to `next` is valid.
    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, PipelineState::Failed { .. }) {
            return true;
        }

        match (self, next) {
            (PipelineState::Testing { attempt: a }, PipelineState::Testing { attempt: b }) => {
                *b == *a + 1
            }
            (PipelineState::Implementing, PipelineState::Testing { attempt }) => *attempt == 0,
            _ => matches!(
                (self, next),
                (PipelineState::Fetching, PipelineState::MarkingInProgress)
                    | (PipelineState::MarkingInProgress, PipelineState::Provisioning)
                    | (PipelineState::Provisioning, PipelineState::Implementing)
                    | (PipelineState::Implementing, PipelineState::Committing)
                    | (PipelineState::Testing { .. }, PipelineState::Committing)
                    | (PipelineState::Committing, PipelineState::OpeningPr)
                    | (PipelineState::Committing, PipelineState::NoChanges)
                    | (PipelineState::OpeningPr, PipelineState::MarkingInReview)
                    | (PipelineState::MarkingInReview, PipelineState::Succeeded)
            ),
        }
    }
}
