//! Wire data model for the pipeline backend.
//!
//! Everything here mirrors what the backend serves. The client never invents
//! state: each struct is overwritten wholesale by the latest fetch, and the
//! `WorkflowRecord` is the single source of truth for how far a ticket has
//! progressed through the pipeline.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A ticket in the external issue tracker. Read-only to the pipeline except
/// for its comment stream, which the tracker owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub reporter: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub pull_requests: Vec<String>,
    #[serde(default)]
    pub comments: Vec<ExternalComment>,
}

/// A public comment on the ticket, owned entirely by the issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalComment {
    pub id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Who authored an internal annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationAuthor {
    Human,
    Automated,
}

impl AnnotationAuthor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Automated => "automated",
        }
    }
}

impl FromStr for AnnotationAuthor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "automated" => Ok(Self::Automated),
            _ => Err(format!("Invalid annotation author: {}", s)),
        }
    }
}

/// An internal note on a ticket, hidden from the external tracker.
/// Written by a human or produced by an automated analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub ticket_key: String,
    pub content: String,
    pub author_kind: AnnotationAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Metadata the branch-name generator attaches to its suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchNameMeta {
    pub confidence: f64,
    pub reasoning: Option<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub generated_at: Option<DateTime<Utc>>,
}

/// The worktree sub-record of a workflow. Cleared (not the whole workflow)
/// when the worktree is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeInfo {
    pub id: String,
    pub path: String,
    pub subfolder: Option<String>,
    pub base_branch: Option<String>,
}

/// Lifecycle status of an AI coding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    ContextSent,
    Running,
    Stopped,
    Crashed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ContextSent => "context_sent",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Crashed => "crashed",
        }
    }

    /// Context has reached the session (or it progressed past that point).
    /// This is the completion signal for the AI-session stage.
    pub fn context_reached(&self) -> bool {
        !matches!(self, Self::NotStarted)
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "context_sent" => Ok(Self::ContextSent),
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "crashed" => Ok(Self::Crashed),
            _ => Err(format!("Invalid session status: {}", s)),
        }
    }
}

/// The AI-session sub-record of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(rename = "happySessionId")]
    pub session_id: String,
    #[serde(rename = "happyProcessId")]
    pub process_id: Option<i64>,
    pub mode: Option<String>,
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// One-per-ticket aggregate tracking pipeline progress. Server-owned: every
/// mutation is a round trip and the response replaces the local copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub id: String,
    pub ticket_key: String,
    pub analysis_session_id: Option<String>,
    pub branch_name: Option<String>,
    pub branch_name_meta: Option<BranchNameMeta>,
    pub worktree: Option<WorktreeInfo>,
    pub session: Option<SessionInfo>,
    pub verification_id: Option<String>,
    pub resolution_id: Option<String>,
    pub integration_test_id: Option<String>,
    pub pull_request_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowRecord {
    pub fn has_branch_name(&self) -> bool {
        self.branch_name.as_deref().is_some_and(|b| !b.is_empty())
    }

    pub fn has_worktree(&self) -> bool {
        self.worktree.is_some()
    }
}

/// A verification run's output. Re-runs supersede but never delete earlier
/// results; the client only ever holds the latest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub id: String,
    pub workflow_id: String,
    pub report: String,
    pub review_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a verification-resolution session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    NotStarted,
    ContextSent,
    InProgress,
    Completed,
}

impl ResolutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ContextSent => "context_sent",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for ResolutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "context_sent" => Ok(Self::ContextSent),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid resolution state: {}", s)),
        }
    }
}

/// Status record for a verification-resolution session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStatus {
    pub id: String,
    pub verification_id: String,
    pub status: ResolutionState,
    pub session: Option<SessionInfo>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Result of an integration-test run against the ticket's worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationTestResult {
    pub id: String,
    pub workflow_id: String,
    pub endpoints_tested: u32,
    pub endpoints_passed: u32,
    pub endpoints_failed: u32,
    pub avg_response_time_ms: Option<f64>,
    pub cleanup_status: Option<String>,
    #[serde(default)]
    pub cleanup_issues: Vec<String>,
    pub report: String,
    pub created_at: DateTime<Utc>,
}

/// Shell commands for resuming a backend-managed session locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeCommands {
    pub cd: String,
    #[serde(rename = "happy")]
    pub session: String,
}

/// Response from starting an AI coding or resolution session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartResponse {
    #[serde(rename = "happySessionId")]
    pub session_id: String,
    #[serde(rename = "happyProcessId")]
    pub process_id: Option<i64>,
    #[serde(rename = "happySessionMetadata")]
    pub metadata: Option<serde_json::Value>,
    pub resume_commands: Option<ResumeCommands>,
}

/// What a long-running trigger endpoint answers.
///
/// The backend returns either a status envelope (`{"status": "processing"}`
/// or `{"status": "already_running"}`) or, when the job finished
/// synchronously, the result object itself.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome<T> {
    /// The job was started; poll for the result.
    Processing,
    /// A job was already in flight; poll, do not re-trigger.
    AlreadyRunning,
    /// The result arrived synchronously; no polling needed.
    Ready(T),
}

#[derive(Deserialize)]
struct StatusEnvelope {
    status: String,
}

impl<T: serde::de::DeserializeOwned> TriggerOutcome<T> {
    /// Decode a trigger response body. The status envelope is tried first;
    /// anything else must deserialize as the result payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if let Ok(envelope) = serde_json::from_value::<StatusEnvelope>(value.clone()) {
            match envelope.status.as_str() {
                "processing" => return Ok(Self::Processing),
                "already_running" => return Ok(Self::AlreadyRunning),
                _ => {}
            }
        }
        serde_json::from_value(value).map(Self::Ready)
    }
}

impl<T> TriggerOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}
