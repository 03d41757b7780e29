//! Per-stage status resolvers.
//!
//! Each resolver is a deterministic mapping from the latest server-reported
//! record (or its absence) to a small closed display status. Absence of a
//! record — the backend's 404 — always resolves to the stage's initial
//! state, never to an error, and a resolver never infers state from side
//! effects.

use crate::models::{
    IntegrationTestResult, ResolutionState, ResolutionStatus, SessionStatus, VerificationResult,
    WorkflowRecord,
};

/// Branch-name generation display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    NotGenerated,
    Generated,
}

/// Worktree display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorktreeStatus {
    NotCreated,
    Created,
}

/// Verification display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    NotRun,
    Completed,
}

/// Integration-test display status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationTestStatus {
    NotRun,
    Completed,
}

pub fn resolve_branch(workflow: Option<&WorkflowRecord>) -> BranchStatus {
    match workflow {
        Some(w) if w.has_branch_name() => BranchStatus::Generated,
        _ => BranchStatus::NotGenerated,
    }
}

pub fn resolve_worktree(workflow: Option<&WorkflowRecord>) -> WorktreeStatus {
    match workflow {
        Some(w) if w.has_worktree() => WorktreeStatus::Created,
        _ => WorktreeStatus::NotCreated,
    }
}

/// The AI session's status is read off the workflow's session sub-record;
/// a workflow without one means the session was never started.
pub fn resolve_session(workflow: Option<&WorkflowRecord>) -> SessionStatus {
    workflow
        .and_then(|w| w.session.as_ref())
        .map(|s| s.status)
        .unwrap_or(SessionStatus::NotStarted)
}

pub fn resolve_verification(result: Option<&VerificationResult>) -> VerificationStatus {
    match result {
        Some(_) => VerificationStatus::Completed,
        None => VerificationStatus::NotRun,
    }
}

pub fn resolve_resolution(status: Option<&ResolutionStatus>) -> ResolutionState {
    status
        .map(|s| s.status)
        .unwrap_or(ResolutionState::NotStarted)
}

pub fn resolve_integration_test(result: Option<&IntegrationTestResult>) -> IntegrationTestStatus {
    match result {
        Some(_) => IntegrationTestStatus::Completed,
        None => IntegrationTestStatus::NotRun,
    }
}
