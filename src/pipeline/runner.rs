//! Stage actions against the backend.
//!
//! `PipelineRunner` owns the API client and the loaded [`PipelineState`].
//! Every action follows the same shape: check the gate, make the round
//! trip, overwrite the local copy with whatever the server answered. For
//! long-running stages the round trip is a trigger followed by a polling
//! loop watching for the result record to supersede the previous one.
//!
//! A failed action leaves the state untouched and retryable; it never
//! flips another stage's gating.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::client::{
    ApiClient, CreateWorktreeRequest, DeleteWorktreeRequest, GenerateBranchNameRequest,
    ResolveRequest, ReviewNotesRequest, StartSessionRequest, VerifyRequest,
};
use crate::errors::{ApiError, PipelineError};
use crate::models::{
    Annotation, AnnotationAuthor, IntegrationTestResult, ResolutionState, ResolutionStatus,
    SessionStartResponse, TriggerOutcome, VerificationResult, WorkflowRecord,
};
use crate::pipeline::state::{PipelineState, Stage};
use crate::poll::{PollConfig, Poller};
use crate::staleness;

pub struct PipelineRunner {
    client: ApiClient,
    poll_config: PollConfig,
    tolerance: Duration,
    state: Option<PipelineState>,
}

impl PipelineRunner {
    pub fn new(client: ApiClient, poll_config: PollConfig, tolerance: Duration) -> Self {
        Self {
            client,
            poll_config,
            tolerance,
            state: None,
        }
    }

    pub fn state(&self) -> Option<&PipelineState> {
        self.state.as_ref()
    }

    /// Load a ticket's aggregate pipeline state. Ticket details, workflow
    /// and annotations are fetched concurrently; none blocks another. The
    /// per-stage result records follow the same way.
    pub async fn load(&mut self, key: &str) -> Result<&PipelineState, PipelineError> {
        let (ticket, workflow, annotations) = tokio::join!(
            self.client.ticket(key),
            self.client.workflow(key),
            self.client.annotations(key),
        );
        let ticket = ticket?;
        let workflow = workflow?;
        let annotations = match annotations {
            Ok(list) => list,
            Err(ApiError::NotFound) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let (verification, resolution, integration_test) = tokio::join!(
            self.client.verification(key),
            self.client.resolution_status(key),
            self.client.latest_integration_test(key),
        );

        let freshness =
            staleness::classify_with_tolerance(&annotations, &ticket.comments, self.tolerance);
        info!(ticket = key, analysis = ?freshness.latest_analysis().map(|a| &a.id), "pipeline loaded");

        self.state = Some(PipelineState {
            ticket,
            workflow,
            annotations,
            freshness,
            verification: verification?,
            resolution: resolution?,
            integration_test: integration_test?,
        });
        self.require_state()
    }

    // ── Gate plumbing ─────────────────────────────────────────────────

    fn require_state(&self) -> Result<&PipelineState, PipelineError> {
        self.state.as_ref().ok_or(PipelineError::NoTicket)
    }

    fn ensure_enabled(&self, stage: Stage) -> Result<String, PipelineError> {
        let state = self.require_state()?;
        if let Some(reason) = stage.lock_reason(state) {
            return Err(PipelineError::StageLocked {
                stage: stage.to_string(),
                reason,
            });
        }
        Ok(state.ticket.key.clone())
    }

    fn reclassify(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.freshness = staleness::classify_with_tolerance(
                &state.annotations,
                &state.ticket.comments,
                self.tolerance,
            );
        }
    }

    async fn refresh_annotations(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        let (ticket, annotations) =
            tokio::join!(self.client.ticket(&key), self.client.annotations(&key));
        let state = self.state.as_mut().ok_or(PipelineError::NoTicket)?;
        state.ticket = ticket?;
        state.annotations = match annotations {
            Ok(list) => list,
            Err(ApiError::NotFound) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        self.reclassify();
        Ok(())
    }

    async fn refresh_workflow(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        let workflow = self.client.workflow(&key).await?;
        if let Some(state) = self.state.as_mut() {
            state.workflow = workflow;
        }
        Ok(())
    }

    fn store_workflow(&mut self, record: WorkflowRecord) {
        if let Some(state) = self.state.as_mut() {
            state.workflow = Some(record);
        }
    }

    // ── Analysis ──────────────────────────────────────────────────────

    /// Trigger the automated analysis job and wait for its annotation.
    /// Re-running supersedes the previous analysis.
    pub async fn run_analysis(&mut self) -> Result<Annotation, PipelineError> {
        let key = self.ensure_enabled(Stage::Analysis)?;
        let baseline = self
            .require_state()?
            .freshness
            .latest_analysis()
            .map(|a| a.created_at);

        let outcome = self.client.trigger_analysis(&key).await?;
        let annotation = match outcome {
            TriggerOutcome::Ready(annotation) => annotation,
            outcome => {
                let client = self.client.clone();
                let poll_key = key.clone();
                let handle = Poller::start(
                    outcome,
                    move || {
                        let client = client.clone();
                        let key = poll_key.clone();
                        async move {
                            let annotations = client.annotations(&key).await?;
                            Ok(latest_automated_after(&annotations, baseline))
                        }
                    },
                    self.poll_config,
                );
                handle
                    .await_result()
                    .await
                    .ok_or_else(|| PipelineError::Cancelled {
                        stage: Stage::Analysis.to_string(),
                    })?
            }
        };

        self.refresh_annotations().await?;
        info!(ticket = %key, annotation = %annotation.id, "analysis completed");
        Ok(annotation)
    }

    // ── Branch name & worktree ────────────────────────────────────────

    pub async fn generate_branch_name(
        &mut self,
        project_id: &str,
        options: Option<serde_json::Value>,
    ) -> Result<WorkflowRecord, PipelineError> {
        let key = self.ensure_enabled(Stage::BranchName)?;
        let record = self
            .client
            .generate_branch_name(&GenerateBranchNameRequest {
                ticket_id: key,
                project_id: project_id.to_string(),
                options,
            })
            .await?;
        self.store_workflow(record.clone());
        Ok(record)
    }

    pub async fn create_worktree(
        &mut self,
        subfolder: &str,
        base_branch: Option<String>,
        env_handling: Option<String>,
        share_node_modules: bool,
    ) -> Result<WorkflowRecord, PipelineError> {
        let key = self.ensure_enabled(Stage::Worktree)?;
        let record = self
            .client
            .create_worktree(&CreateWorktreeRequest {
                ticket_id: key,
                subfolder: subfolder.to_string(),
                base_branch,
                env_handling,
                share_node_modules,
            })
            .await?;
        self.store_workflow(record.clone());
        Ok(record)
    }

    /// Delete the worktree. Only the worktree sub-fields are cleared; the
    /// rest of the workflow record survives.
    pub async fn delete_worktree(
        &mut self,
        delete_branch: Option<bool>,
        force: Option<bool>,
    ) -> Result<WorkflowRecord, PipelineError> {
        let state = self.require_state()?;
        if !state.workflow.as_ref().is_some_and(|w| w.has_worktree()) {
            return Err(PipelineError::StageLocked {
                stage: Stage::Worktree.to_string(),
                reason: "no worktree to delete".to_string(),
            });
        }
        let key = state.ticket.key.clone();
        let record = self
            .client
            .delete_worktree(
                &key,
                &DeleteWorktreeRequest {
                    delete_branch,
                    force,
                },
            )
            .await?;
        self.store_workflow(record.clone());
        Ok(record)
    }

    // ── AI coding session ─────────────────────────────────────────────

    pub async fn start_session(
        &mut self,
        mode: &str,
        additional_instructions: Option<String>,
    ) -> Result<SessionStartResponse, PipelineError> {
        let key = self.ensure_enabled(Stage::Session)?;
        let response = self
            .client
            .start_session(
                &key,
                &StartSessionRequest {
                    mode: mode.to_string(),
                    additional_instructions,
                },
            )
            .await?;
        self.refresh_workflow().await?;
        Ok(response)
    }

    pub async fn stop_session(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        self.client.stop_session(&key).await?;
        self.refresh_workflow().await?;
        Ok(())
    }

    // ── Verification ──────────────────────────────────────────────────

    /// Trigger verification and wait for the result. `already_running`
    /// joins the in-flight job's polling loop without re-triggering.
    pub async fn run_verification(
        &mut self,
        custom_instructions: Option<String>,
    ) -> Result<VerificationResult, PipelineError> {
        let key = self.ensure_enabled(Stage::Verification)?;
        let outcome = self
            .client
            .trigger_verification(
                &key,
                &VerifyRequest {
                    custom_instructions,
                },
            )
            .await?;
        self.await_verification(key, outcome).await
    }

    /// Re-run verification from the resolution stage: the pipeline's one
    /// backward edge, a fresh verification run rather than a rollback.
    pub async fn reverify(&mut self) -> Result<VerificationResult, PipelineError> {
        let key = self.ensure_enabled(Stage::Resolution)?;
        let outcome = self.client.reverify(&key).await?;
        self.await_verification(key, outcome).await
    }

    async fn await_verification(
        &mut self,
        key: String,
        outcome: TriggerOutcome<VerificationResult>,
    ) -> Result<VerificationResult, PipelineError> {
        let baseline = self
            .require_state()?
            .verification
            .as_ref()
            .map(|v| v.created_at);
        let result = match outcome {
            TriggerOutcome::Ready(result) => result,
            outcome => {
                let client = self.client.clone();
                let poll_key = key.clone();
                let handle = Poller::start(
                    outcome,
                    move || {
                        let client = client.clone();
                        let key = poll_key.clone();
                        async move {
                            let latest = client.verification(&key).await?;
                            Ok(latest.filter(|v| is_newer(v.created_at, baseline)))
                        }
                    },
                    self.poll_config,
                );
                handle
                    .await_result()
                    .await
                    .ok_or_else(|| PipelineError::Cancelled {
                        stage: Stage::Verification.to_string(),
                    })?
            }
        };
        info!(ticket = %key, verification = %result.id, "verification completed");
        if let Some(state) = self.state.as_mut() {
            state.verification = Some(result.clone());
        }
        Ok(result)
    }

    pub async fn submit_review_notes(
        &mut self,
        notes: &str,
        reviewed_by: &str,
    ) -> Result<VerificationResult, PipelineError> {
        let state = self.require_state()?;
        let verification_id = state
            .verification
            .as_ref()
            .map(|v| v.id.clone())
            .ok_or_else(|| PipelineError::StageLocked {
                stage: Stage::Verification.to_string(),
                reason: "no verification result to annotate".to_string(),
            })?;
        let result = self
            .client
            .submit_review_notes(
                &verification_id,
                &ReviewNotesRequest {
                    notes: notes.to_string(),
                    reviewed_by: reviewed_by.to_string(),
                },
            )
            .await?;
        if let Some(state) = self.state.as_mut() {
            state.verification = Some(result.clone());
        }
        Ok(result)
    }

    pub async fn approve_for_pr(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        self.client.approve_for_pr(&key).await?;
        Ok(())
    }

    // ── Verification resolution ───────────────────────────────────────

    pub async fn start_resolution(
        &mut self,
        mode: &str,
        instructions: Option<String>,
    ) -> Result<SessionStartResponse, PipelineError> {
        let key = self.ensure_enabled(Stage::Resolution)?;
        let verification_id = self
            .require_state()?
            .verification
            .as_ref()
            .map(|v| v.id.clone());
        let response = self
            .client
            .start_resolution(
                &key,
                &ResolveRequest {
                    mode: mode.to_string(),
                    instructions,
                    verification_id,
                },
            )
            .await?;
        self.refresh_resolution().await?;
        Ok(response)
    }

    /// Poll the resolution session until it reports `completed`.
    pub async fn await_resolution(&mut self) -> Result<ResolutionStatus, PipelineError> {
        let key = self.ensure_enabled(Stage::Resolution)?;
        let client = self.client.clone();
        let poll_key = key.clone();
        let handle = Poller::start(
            TriggerOutcome::Processing,
            move || {
                let client = client.clone();
                let key = poll_key.clone();
                async move {
                    let status = client.resolution_status(&key).await?;
                    Ok(status.filter(|s| s.status == ResolutionState::Completed))
                }
            },
            self.poll_config,
        );
        let status = handle
            .await_result()
            .await
            .ok_or_else(|| PipelineError::Cancelled {
                stage: Stage::Resolution.to_string(),
            })?;
        if let Some(state) = self.state.as_mut() {
            state.resolution = Some(status.clone());
        }
        Ok(status)
    }

    pub async fn stop_resolution(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        self.client.stop_resolution(&key).await?;
        self.refresh_resolution().await
    }

    pub async fn complete_resolution(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        self.client.complete_resolution(&key).await?;
        self.refresh_resolution().await
    }

    async fn refresh_resolution(&mut self) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        let resolution = self.client.resolution_status(&key).await?;
        if let Some(state) = self.state.as_mut() {
            state.resolution = resolution;
        }
        Ok(())
    }

    // ── Integration testing ───────────────────────────────────────────

    pub async fn run_integration_test(
        &mut self,
        custom_instructions: Option<String>,
    ) -> Result<IntegrationTestResult, PipelineError> {
        let key = self.ensure_enabled(Stage::IntegrationTest)?;
        let baseline = self
            .require_state()?
            .integration_test
            .as_ref()
            .map(|r| r.created_at);
        let outcome = self
            .client
            .trigger_integration_test(
                &key,
                &VerifyRequest {
                    custom_instructions,
                },
            )
            .await?;
        let result = match outcome {
            TriggerOutcome::Ready(result) => result,
            outcome => {
                let client = self.client.clone();
                let poll_key = key.clone();
                let handle = Poller::start(
                    outcome,
                    move || {
                        let client = client.clone();
                        let key = poll_key.clone();
                        async move {
                            let latest = client.latest_integration_test(&key).await?;
                            Ok(latest.filter(|r| is_newer(r.created_at, baseline)))
                        }
                    },
                    self.poll_config,
                );
                handle
                    .await_result()
                    .await
                    .ok_or_else(|| PipelineError::Cancelled {
                        stage: Stage::IntegrationTest.to_string(),
                    })?
            }
        };
        if let Some(state) = self.state.as_mut() {
            state.integration_test = Some(result.clone());
        }
        Ok(result)
    }

    // ── Annotations ───────────────────────────────────────────────────

    pub async fn add_annotation(&mut self, content: &str) -> Result<Annotation, PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        let annotation = self.client.create_annotation(&key, content).await?;
        self.refresh_annotations().await?;
        Ok(annotation)
    }

    pub async fn edit_annotation(
        &mut self,
        annotation_id: &str,
        content: &str,
    ) -> Result<Annotation, PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        let annotation = self
            .client
            .update_annotation(&key, annotation_id, content)
            .await?;
        self.refresh_annotations().await?;
        Ok(annotation)
    }

    pub async fn remove_annotation(&mut self, annotation_id: &str) -> Result<(), PipelineError> {
        let key = self.require_state()?.ticket.key.clone();
        self.client.delete_annotation(&key, annotation_id).await?;
        self.refresh_annotations().await
    }
}

/// Newest automated annotation created strictly after `baseline` (any, when
/// no baseline exists). The terminal predicate for analysis polling.
fn latest_automated_after(
    annotations: &[Annotation],
    baseline: Option<DateTime<Utc>>,
) -> Option<Annotation> {
    annotations
        .iter()
        .filter(|a| a.author_kind == AnnotationAuthor::Automated)
        .filter(|a| baseline.is_none_or(|b| a.created_at > b))
        .max_by_key(|a| a.created_at)
        .cloned()
}

fn is_newer(created_at: DateTime<Utc>, baseline: Option<DateTime<Utc>>) -> bool {
    baseline.is_none_or(|b| created_at > b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn annotation(id: &str, author: AnnotationAuthor, millis: i64) -> Annotation {
        Annotation {
            id: id.to_string(),
            ticket_key: "PROJ-1".to_string(),
            content: String::new(),
            author_kind: author,
            created_at: Utc.timestamp_millis_opt(millis).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn latest_automated_after_skips_human_and_stale_entries() {
        let annotations = vec![
            annotation("old", AnnotationAuthor::Automated, 100),
            annotation("human", AnnotationAuthor::Human, 500),
            annotation("new", AnnotationAuthor::Automated, 300),
        ];
        let baseline = Some(Utc.timestamp_millis_opt(100).unwrap());
        let found = latest_automated_after(&annotations, baseline).unwrap();
        assert_eq!(found.id, "new");
    }

    #[test]
    fn latest_automated_after_without_baseline_takes_newest() {
        let annotations = vec![
            annotation("a", AnnotationAuthor::Automated, 100),
            annotation("b", AnnotationAuthor::Automated, 200),
        ];
        assert_eq!(latest_automated_after(&annotations, None).unwrap().id, "b");
    }

    #[test]
    fn latest_automated_after_returns_none_at_baseline() {
        let annotations = vec![annotation("a", AnnotationAuthor::Automated, 100)];
        let baseline = Some(Utc.timestamp_millis_opt(100).unwrap());
        assert!(latest_automated_after(&annotations, baseline).is_none());
    }

    #[test]
    fn is_newer_requires_strictly_later_timestamp() {
        let t = Utc.timestamp_millis_opt(100).unwrap();
        assert!(is_newer(t, None));
        assert!(!is_newer(t, Some(t)));
        assert!(is_newer(
            Utc.timestamp_millis_opt(101).unwrap(),
            Some(t)
        ));
    }
}
