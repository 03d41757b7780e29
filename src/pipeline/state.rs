//! The ticket pipeline state machine.
//!
//! `PipelineState` is the client-side aggregate for one ticket, refreshed
//! wholesale from backend fetches. `Stage` enumerates the pipeline's ordered
//! stages and answers the two questions the whole UI hangs off: is a stage
//! enabled (its predecessors are far enough along) and is it complete.
//!
//! | Stage            | Enabled when                                   | Complete when                  |
//! |------------------|------------------------------------------------|--------------------------------|
//! | Analysis         | always                                         | freshness is `Complete`        |
//! | BranchName       | freshness ≠ `None`                             | workflow has a branch name     |
//! | Worktree         | branch name exists                             | workflow has a worktree        |
//! | Session          | worktree exists AND freshness ≠ `None`         | session reached `context_sent` |
//! | Verification     | worktree AND branch name AND freshness complete| a VerificationResult exists    |
//! | Resolution       | a VerificationResult exists                    | resolution is `completed`      |
//! | IntegrationTest  | always once the ticket is loaded               | an IntegrationTestResult exists|

use crate::models::{
    Annotation, IntegrationTestResult, ResolutionState, ResolutionStatus, Ticket,
    VerificationResult, WorkflowRecord,
};
use crate::staleness::AnalysisFreshness;
use crate::stages;

/// Client-side aggregate for one loaded ticket. Server-owned data only; the
/// runner overwrites fields from fetch responses and never edits them
/// optimistically.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub ticket: Ticket,
    pub workflow: Option<WorkflowRecord>,
    pub annotations: Vec<Annotation>,
    pub freshness: AnalysisFreshness,
    pub verification: Option<VerificationResult>,
    pub resolution: Option<ResolutionStatus>,
    pub integration_test: Option<IntegrationTestResult>,
}

/// Ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analysis,
    BranchName,
    Worktree,
    Session,
    Verification,
    Resolution,
    IntegrationTest,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Analysis,
        Stage::BranchName,
        Stage::Worktree,
        Stage::Session,
        Stage::Verification,
        Stage::Resolution,
        Stage::IntegrationTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::BranchName => "branch-name",
            Self::Worktree => "worktree",
            Self::Session => "session",
            Self::Verification => "verification",
            Self::Resolution => "resolution",
            Self::IntegrationTest => "integration-test",
        }
    }

    /// Whether the stage's action may be triggered, given predecessor
    /// completion. Depends only on `state`, never on navigation order or on
    /// any sibling stage's transient errors.
    pub fn is_enabled(&self, state: &PipelineState) -> bool {
        self.lock_reason(state).is_none()
    }

    /// Why the stage is locked, or `None` when it is enabled. The reason is
    /// what gets shown to the user next to a disabled action.
    pub fn lock_reason(&self, state: &PipelineState) -> Option<String> {
        let workflow = state.workflow.as_ref();
        let has_branch = workflow.is_some_and(|w| w.has_branch_name());
        let has_worktree = workflow.is_some_and(|w| w.has_worktree());

        match self {
            Self::Analysis | Self::IntegrationTest => None,
            Self::BranchName => state
                .freshness
                .is_none()
                .then(|| "no analysis exists for this ticket yet".to_string()),
            Self::Worktree => {
                (!has_branch).then(|| "no branch name generated yet".to_string())
            }
            Self::Session => {
                if !has_worktree {
                    Some("no worktree created yet".to_string())
                } else if state.freshness.is_none() {
                    Some("no analysis exists for this ticket yet".to_string())
                } else {
                    None
                }
            }
            Self::Verification => {
                if !has_worktree {
                    Some("no worktree created yet".to_string())
                } else if !has_branch {
                    Some("no branch name generated yet".to_string())
                } else if !state.freshness.is_complete() {
                    Some("analysis is missing or outdated".to_string())
                } else {
                    None
                }
            }
            Self::Resolution => state
                .verification
                .is_none()
                .then(|| "no verification result to resolve".to_string()),
        }
    }

    /// Whether the stage's completion signal has been observed.
    pub fn is_complete(&self, state: &PipelineState) -> bool {
        match self {
            Self::Analysis => state.freshness.is_complete(),
            Self::BranchName => {
                stages::resolve_branch(state.workflow.as_ref()) == stages::BranchStatus::Generated
            }
            Self::Worktree => {
                stages::resolve_worktree(state.workflow.as_ref())
                    == stages::WorktreeStatus::Created
            }
            Self::Session => {
                stages::resolve_session(state.workflow.as_ref()).context_reached()
            }
            Self::Verification => {
                stages::resolve_verification(state.verification.as_ref())
                    == stages::VerificationStatus::Completed
            }
            Self::Resolution => {
                stages::resolve_resolution(state.resolution.as_ref())
                    == ResolutionState::Completed
            }
            Self::IntegrationTest => {
                stages::resolve_integration_test(state.integration_test.as_ref())
                    == stages::IntegrationTestStatus::Completed
            }
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
