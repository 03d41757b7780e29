//! Typed client for the pipeline backend.
//!
//! One async method per collaborator endpoint. Getters whose resource may
//! legitimately not exist yet (`workflow`, `verification`,
//! `resolution_status`, `latest_integration_test`) return `Ok(None)` for a
//! 404 — "not started" is a valid state, not an error. Trigger endpoints
//! decode into [`TriggerOutcome`] so callers can tell a synchronous result
//! from a background job.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::errors::ApiError;
use crate::models::{
    Annotation, IntegrationTestResult, ResolutionStatus, SessionStartResponse, Ticket,
    TriggerOutcome, VerificationResult, WorkflowRecord,
};

// ── Request payload types ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBranchNameRequest {
    pub ticket_id: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorktreeRequest {
    pub ticket_id: String,
    pub subfolder: String,
    pub base_branch: Option<String>,
    pub env_handling: Option<String>,
    pub share_node_modules: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteWorktreeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_branch: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNotesRequest {
    pub notes: String,
    pub reviewed_by: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRequest {
    pub content: String,
}

// ── Client ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        reqwest::Url::parse(base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    // ── Plumbing ──────────────────────────────────────────────────────

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ApiError::Transient)?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }
        serde_json::from_str(&body).map_err(ApiError::InvalidResponse)
    }

    async fn check_empty(resp: reqwest::Response) -> Result<(), ApiError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            let body = resp.text().await.map_err(ApiError::Transient)?;
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(status.as_u16(), &body),
            });
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(ApiError::Transient)?;
        Self::decode(resp).await
    }

    /// GET where a 404 means "not started yet" rather than an error.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        match self.get_json(path).await {
            Ok(value) => Ok(Some(value)),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!("POST {}", path);
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(ApiError::Transient)?;
        Self::decode(resp).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        debug!("POST {}", path);
        let resp = self
            .http
            .post(self.url(path))
            .send()
            .await
            .map_err(ApiError::Transient)?;
        Self::check_empty(resp).await
    }

    /// POST to a trigger endpoint whose response is either a status envelope
    /// or the finished result itself.
    async fn post_trigger<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<TriggerOutcome<T>, ApiError> {
        let value: serde_json::Value = self.post_json(path, body).await?;
        TriggerOutcome::from_value(value).map_err(ApiError::InvalidResponse)
    }

    // ── Workflow ──────────────────────────────────────────────────────

    pub async fn workflow(&self, ticket: &str) -> Result<Option<WorkflowRecord>, ApiError> {
        self.get_optional(&format!("workflows/ticket/{}", ticket))
            .await
    }

    pub async fn generate_branch_name(
        &self,
        req: &GenerateBranchNameRequest,
    ) -> Result<WorkflowRecord, ApiError> {
        self.post_json("workflows/branch-name", req).await
    }

    pub async fn create_worktree(
        &self,
        req: &CreateWorktreeRequest,
    ) -> Result<WorkflowRecord, ApiError> {
        self.post_json("workflows/worktree", req).await
    }

    pub async fn delete_worktree(
        &self,
        ticket: &str,
        req: &DeleteWorktreeRequest,
    ) -> Result<WorkflowRecord, ApiError> {
        debug!("DELETE workflows/ticket/{}/worktree", ticket);
        let resp = self
            .http
            .delete(self.url(&format!("workflows/ticket/{}/worktree", ticket)))
            .json(req)
            .send()
            .await
            .map_err(ApiError::Transient)?;
        Self::decode(resp).await
    }

    // ── AI coding session ─────────────────────────────────────────────

    pub async fn start_session(
        &self,
        ticket: &str,
        req: &StartSessionRequest,
    ) -> Result<SessionStartResponse, ApiError> {
        self.post_json(&format!("workflows/ticket/{}/happy/start", ticket), req)
            .await
    }

    pub async fn stop_session(&self, ticket: &str) -> Result<(), ApiError> {
        self.post_empty(&format!("workflows/ticket/{}/happy/stop", ticket))
            .await
    }

    // ── Verification ──────────────────────────────────────────────────

    pub async fn trigger_verification(
        &self,
        ticket: &str,
        req: &VerifyRequest,
    ) -> Result<TriggerOutcome<VerificationResult>, ApiError> {
        self.post_trigger(&format!("workflows/ticket/{}/verify", ticket), req)
            .await
    }

    pub async fn verification(&self, ticket: &str) -> Result<Option<VerificationResult>, ApiError> {
        self.get_optional(&format!("workflows/ticket/{}/verification", ticket))
            .await
    }

    pub async fn submit_review_notes(
        &self,
        verification_id: &str,
        req: &ReviewNotesRequest,
    ) -> Result<VerificationResult, ApiError> {
        self.post_json(
            &format!("workflows/verification/{}/notes", verification_id),
            req,
        )
        .await
    }

    pub async fn approve_for_pr(&self, ticket: &str) -> Result<(), ApiError> {
        self.post_empty(&format!("workflows/ticket/{}/approve-for-pr", ticket))
            .await
    }

    // ── Verification resolution ───────────────────────────────────────

    pub async fn start_resolution(
        &self,
        ticket: &str,
        req: &ResolveRequest,
    ) -> Result<SessionStartResponse, ApiError> {
        self.post_json(
            &format!("workflows/ticket/{}/verification/resolve", ticket),
            req,
        )
        .await
    }

    pub async fn resolution_status(
        &self,
        ticket: &str,
    ) -> Result<Option<ResolutionStatus>, ApiError> {
        self.get_optional(&format!(
            "workflows/ticket/{}/verification/resolve/status",
            ticket
        ))
        .await
    }

    pub async fn stop_resolution(&self, ticket: &str) -> Result<(), ApiError> {
        self.post_empty(&format!(
            "workflows/ticket/{}/verification/resolve/stop",
            ticket
        ))
        .await
    }

    pub async fn complete_resolution(&self, ticket: &str) -> Result<(), ApiError> {
        self.post_empty(&format!(
            "workflows/ticket/{}/verification/resolve/complete",
            ticket
        ))
        .await
    }

    /// Re-run verification from the resolution stage. The one backward edge
    /// in the pipeline, modeled as a fresh verification run.
    pub async fn reverify(
        &self,
        ticket: &str,
    ) -> Result<TriggerOutcome<VerificationResult>, ApiError> {
        self.post_trigger(
            &format!("workflows/ticket/{}/verification/resolve/re-verify", ticket),
            &serde_json::json!({}),
        )
        .await
    }

    // ── Integration testing ───────────────────────────────────────────

    pub async fn trigger_integration_test(
        &self,
        ticket: &str,
        req: &VerifyRequest,
    ) -> Result<TriggerOutcome<IntegrationTestResult>, ApiError> {
        self.post_trigger(&format!("workflows/ticket/{}/integration-test", ticket), req)
            .await
    }

    pub async fn latest_integration_test(
        &self,
        ticket: &str,
    ) -> Result<Option<IntegrationTestResult>, ApiError> {
        self.get_optional(&format!(
            "workflows/ticket/{}/integration-test/latest",
            ticket
        ))
        .await
    }

    // ── Ticket, annotations, analysis ─────────────────────────────────

    pub async fn ticket(&self, ticket: &str) -> Result<Ticket, ApiError> {
        self.get_json(&format!("jira/tickets/{}/details", ticket))
            .await
    }

    pub async fn annotations(&self, ticket: &str) -> Result<Vec<Annotation>, ApiError> {
        self.get_json(&format!("jira/tickets/{}/hidden-comments", ticket))
            .await
    }

    pub async fn create_annotation(
        &self,
        ticket: &str,
        content: &str,
    ) -> Result<Annotation, ApiError> {
        self.post_json(
            &format!("jira/tickets/{}/hidden-comments", ticket),
            &AnnotationRequest {
                content: content.to_string(),
            },
        )
        .await
    }

    pub async fn update_annotation(
        &self,
        ticket: &str,
        annotation_id: &str,
        content: &str,
    ) -> Result<Annotation, ApiError> {
        debug!("PUT jira/tickets/{}/hidden-comments/{}", ticket, annotation_id);
        let resp = self
            .http
            .put(self.url(&format!(
                "jira/tickets/{}/hidden-comments/{}",
                ticket, annotation_id
            )))
            .json(&AnnotationRequest {
                content: content.to_string(),
            })
            .send()
            .await
            .map_err(ApiError::Transient)?;
        Self::decode(resp).await
    }

    pub async fn delete_annotation(
        &self,
        ticket: &str,
        annotation_id: &str,
    ) -> Result<(), ApiError> {
        debug!("DELETE jira/tickets/{}/hidden-comments/{}", ticket, annotation_id);
        let resp = self
            .http
            .delete(self.url(&format!(
                "jira/tickets/{}/hidden-comments/{}",
                ticket, annotation_id
            )))
            .send()
            .await
            .map_err(ApiError::Transient)?;
        Self::check_empty(resp).await
    }

    /// Kick off the automated analysis job. Completion is observed as a new
    /// automated annotation on the ticket.
    pub async fn trigger_analysis(
        &self,
        ticket: &str,
    ) -> Result<TriggerOutcome<Annotation>, ApiError> {
        self.post_trigger(
            &format!("jira/tickets/{}/analyze", ticket),
            &serde_json::json!({}),
        )
        .await
    }
}

/// Pull a human-readable message out of an error body. The backend answers
/// with `{"error": ...}` or `{"message": ...}`; anything else falls back to
/// the raw body or the bare status code.
fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(msg) = value.get(key).and_then(|m| m.as_str()) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("Request failed with status {}", status)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_error_key() {
        let msg = extract_error_message(409, r#"{"error": "worktree exists", "message": "x"}"#);
        assert_eq!(msg, "worktree exists");
    }

    #[test]
    fn error_message_falls_back_to_message_key() {
        let msg = extract_error_message(400, r#"{"message": "missing subfolder"}"#);
        assert_eq!(msg, "missing subfolder");
    }

    #[test]
    fn error_message_falls_back_to_raw_body_then_status() {
        assert_eq!(extract_error_message(500, "boom"), "boom");
        assert_eq!(
            extract_error_message(502, "   "),
            "Request failed with status 502"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:3001/").unwrap();
        assert_eq!(
            client.url("workflows/ticket/PROJ-1"),
            "http://localhost:3001/workflows/ticket/PROJ-1"
        );
    }
}
