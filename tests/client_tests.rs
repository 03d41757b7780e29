//! End-to-end tests for the API client and pipeline runner against a mock
//! backend.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use conveyor::client::ApiClient;
use conveyor::errors::{ApiError, PipelineError};
use conveyor::pipeline::{PipelineRunner, Stage};
use conveyor::poll::PollConfig;

const TICKET: &str = "PROJ-1";

fn fast_poll() -> PollConfig {
    PollConfig {
        startup_delay: Duration::from_millis(5),
        interval: Duration::from_millis(10),
    }
}

fn ticket_body(comments: serde_json::Value) -> serde_json::Value {
    json!({
        "key": TICKET,
        "summary": "Add login endpoint",
        "status": "In Progress",
        "priority": "high",
        "assignee": "dev",
        "reporter": "pm",
        "labels": ["backend"],
        "pullRequests": [],
        "comments": comments
    })
}

fn automated_annotation(id: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "ticketKey": TICKET,
        "content": "analysis report",
        "authorKind": "automated",
        "createdAt": created_at,
        "updatedAt": null
    })
}

fn verification_body(id: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "workflowId": "wf-1",
        "report": "all checks passed",
        "reviewNotes": null,
        "reviewedBy": null,
        "reviewedAt": null,
        "createdAt": created_at
    })
}

fn workflow_body(branch: Option<&str>, worktree: bool) -> serde_json::Value {
    json!({
        "id": "wf-1",
        "ticketKey": TICKET,
        "branchName": branch,
        "worktree": if worktree {
            json!({"id": "wt-1", "path": "/work/proj-1", "subfolder": "api", "baseBranch": "main"})
        } else {
            json!(null)
        }
    })
}

/// Mount the fetches `load` always performs. Wiremock matches mocks in mount
/// order, so tests that script their own responses for one of the stage
/// getters list its path suffix in `skip` and mount those mocks themselves.
async fn mount_baseline(
    server: &MockServer,
    ticket: serde_json::Value,
    workflow: Option<serde_json::Value>,
    annotations: serde_json::Value,
    skip: &[&str],
) {
    Mock::given(method("GET"))
        .and(path(format!("/jira/tickets/{}/details", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket))
        .mount(server)
        .await;
    let workflow_resp = match workflow {
        Some(body) => ResponseTemplate::new(200).set_body_json(body),
        None => ResponseTemplate::new(404),
    };
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}", TICKET)))
        .respond_with(workflow_resp)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/jira/tickets/{}/hidden-comments", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(annotations))
        .mount(server)
        .await;
    for suffix in [
        "verification",
        "verification/resolve/status",
        "integration-test/latest",
    ] {
        if skip.contains(&suffix) {
            continue;
        }
        Mock::given(method("GET"))
            .and(path(format!("/workflows/ticket/{}/{}", TICKET, suffix)))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }
}

async fn loaded_runner(server: &MockServer) -> PipelineRunner {
    let client = ApiClient::new(&server.uri()).unwrap();
    let mut runner = PipelineRunner::new(client, fast_poll(), chrono::Duration::milliseconds(1000));
    runner.load(TICKET).await.unwrap();
    runner
}

#[tokio::test]
async fn not_found_getters_map_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = ApiClient::new(&server.uri()).unwrap();

    assert!(client.workflow(TICKET).await.unwrap().is_none());
    assert!(client.verification(TICKET).await.unwrap().is_none());
    assert!(client.resolution_status(TICKET).await.unwrap().is_none());
    assert!(client.latest_integration_test(TICKET).await.unwrap().is_none());
}

#[tokio::test]
async fn rejected_action_surfaces_the_server_message() {
    let server = MockServer::start().await;
    mount_baseline(
        &server,
        ticket_body(json!([])),
        Some(workflow_body(Some("feature/proj-1"), false)),
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &[],
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/workflows/worktree"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"error": "subfolder already in use"})),
        )
        .mount(&server)
        .await;

    let mut runner = loaded_runner(&server).await;
    let err = runner
        .create_worktree("api", None, None, false)
        .await
        .unwrap_err();
    match err {
        PipelineError::Api(ApiError::Rejected { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "subfolder already in use");
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    // The failed action left the stage retryable and the state unchanged.
    let state = runner.state().unwrap();
    assert!(Stage::Worktree.is_enabled(state));
    assert!(!Stage::Worktree.is_complete(state));
}

#[tokio::test]
async fn branch_name_is_gated_without_an_analysis() {
    let server = MockServer::start().await;
    // No annotations at all: freshness is `none`.
    mount_baseline(&server, ticket_body(json!([])), None, json!([]), &[]).await;

    let mut runner = loaded_runner(&server).await;
    let err = runner.generate_branch_name("proj-7", None).await.unwrap_err();
    assert!(matches!(err, PipelineError::StageLocked { .. }));
    // No trigger request was issued: the mock server saw only the load GETs.
    assert!(
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .all(|r| r.method.as_str() == "GET")
    );
}

#[tokio::test]
async fn load_classifies_staleness_from_comments() {
    let server = MockServer::start().await;
    // Comment 30 minutes after the analysis: well past tolerance.
    mount_baseline(
        &server,
        ticket_body(json!([{
            "id": "c-1",
            "body": "actually, scope changed",
            "createdAt": "2026-08-01T10:30:00Z"
        }])),
        None,
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &[],
    )
    .await;

    let runner = loaded_runner(&server).await;
    let state = runner.state().unwrap();
    assert!(!state.freshness.is_complete());
    assert!(!state.freshness.is_none());
    // Analysis exists, so branch generation is unlocked even while pending.
    assert!(Stage::BranchName.is_enabled(state));
    assert!(!Stage::Verification.is_enabled(state));
}

#[tokio::test]
async fn verification_trigger_processing_polls_until_result() {
    let server = MockServer::start().await;
    // 404 for the load fetch and the first poll, then the result appears.
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-1", "2026-08-01T11:00:00Z")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/workflows/ticket/{}/verify", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_baseline(
        &server,
        ticket_body(json!([])),
        Some(workflow_body(Some("feature/proj-1"), true)),
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &["verification"],
    )
    .await;

    let mut runner = loaded_runner(&server).await;
    let result = runner.run_verification(None).await.unwrap();
    assert_eq!(result.id, "ver-1");
    let state = runner.state().unwrap();
    assert!(Stage::Verification.is_complete(state));
    assert!(Stage::Resolution.is_enabled(state));
}

#[tokio::test]
async fn already_running_enters_polling_without_a_second_trigger() {
    let server = MockServer::start().await;
    // 404 only for the load fetch; the in-flight job's result lands next.
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-2", "2026-08-01T11:05:00Z")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/workflows/ticket/{}/verify", TICKET)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "already_running"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    mount_baseline(
        &server,
        ticket_body(json!([])),
        Some(workflow_body(Some("feature/proj-1"), true)),
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &["verification"],
    )
    .await;

    let mut runner = loaded_runner(&server).await;
    let result = runner.run_verification(None).await.unwrap();
    assert_eq!(result.id, "ver-2");
    // expect(1) on the trigger mock verifies no second POST on drop.
}

#[tokio::test]
async fn synchronous_verification_result_skips_polling() {
    let server = MockServer::start().await;
    mount_baseline(
        &server,
        ticket_body(json!([])),
        Some(workflow_body(Some("feature/proj-1"), true)),
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &[],
    )
    .await;
    Mock::given(method("POST"))
        .and(path(format!("/workflows/ticket/{}/verify", TICKET)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-3", "2026-08-01T11:10:00Z")),
        )
        .mount(&server)
        .await;
    // GET /verification stays 404 throughout: a poll would never complete,
    // so finishing proves the direct-result path was taken.

    let mut runner = loaded_runner(&server).await;
    let result = runner.run_verification(None).await.unwrap();
    assert_eq!(result.id, "ver-3");
}

#[tokio::test]
async fn analysis_polling_waits_for_a_new_automated_annotation() {
    let server = MockServer::start().await;
    let old = automated_annotation("an-1", "2026-08-01T10:00:00Z");
    let new = automated_annotation("an-2", "2026-08-01T12:00:00Z");

    // The stale analysis for the load fetch and the first poll, then the
    // fresh one for later polls and the final refresh.
    Mock::given(method("GET"))
        .and(path(format!("/jira/tickets/{}/hidden-comments", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([old.clone()])))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/jira/tickets/{}/hidden-comments", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([old, new])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/jira/tickets/{}/analyze", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/jira/tickets/{}/details", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ticket_body(json!([]))))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}", TICKET)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    for suffix in [
        "verification",
        "verification/resolve/status",
        "integration-test/latest",
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/workflows/ticket/{}/{}", TICKET, suffix)))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }

    let client = ApiClient::new(&server.uri()).unwrap();
    let mut runner = PipelineRunner::new(client, fast_poll(), chrono::Duration::milliseconds(1000));
    runner.load(TICKET).await.unwrap();

    let annotation = runner.run_analysis().await.unwrap();
    assert_eq!(annotation.id, "an-2");
    let state = runner.state().unwrap();
    assert!(state.freshness.is_complete());
    assert_eq!(state.freshness.latest_analysis().unwrap().id, "an-2");
}

#[tokio::test]
async fn deleting_the_worktree_clears_only_the_worktree_fields() {
    let server = MockServer::start().await;
    mount_baseline(
        &server,
        ticket_body(json!([])),
        Some(workflow_body(Some("feature/proj-1"), true)),
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &[],
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/workflows/ticket/{}/worktree", TICKET)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(workflow_body(Some("feature/proj-1"), false)),
        )
        .mount(&server)
        .await;

    let mut runner = loaded_runner(&server).await;
    let record = runner.delete_worktree(Some(true), None).await.unwrap();
    assert!(record.has_branch_name());
    assert!(!record.has_worktree());
    let state = runner.state().unwrap();
    // Branch name survives, so the worktree stage is immediately retryable.
    assert!(Stage::Worktree.is_enabled(state));
}

#[tokio::test]
async fn transient_failures_during_polling_are_swallowed() {
    let server = MockServer::start().await;
    // 404 for the load fetch, a 500 on the first poll, then the result.
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/workflows/ticket/{}/verification", TICKET)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(verification_body("ver-4", "2026-08-01T11:20:00Z")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/workflows/ticket/{}/verify", TICKET)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "processing"})))
        .mount(&server)
        .await;
    mount_baseline(
        &server,
        ticket_body(json!([])),
        Some(workflow_body(Some("feature/proj-1"), true)),
        json!([automated_annotation("an-1", "2026-08-01T10:00:00Z")]),
        &["verification"],
    )
    .await;

    let mut runner = loaded_runner(&server).await;
    let result = runner.run_verification(None).await.unwrap();
    assert_eq!(result.id, "ver-4");
}
