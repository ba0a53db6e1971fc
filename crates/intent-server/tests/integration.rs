use axum::http::StatusCode;
use http_body_util::BodyExt;
use intent_core::collaborator::{DocumentCollaborator, DocumentPayload};
use intent_core::{Hub, HubError};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Accepts every document; ids are derived from the title.
struct FakeDocs;

impl DocumentCollaborator for FakeDocs {
    fn create_document(&self, payload: &DocumentPayload) -> intent_core::Result<String> {
        if payload.title == "Reject" {
            return Err(HubError::Collaborator("400 validation failed".into()));
        }
        Ok(format!("doc-{}", payload.title.to_lowercase()))
    }

    fn update_document(&self, _id: &str, _payload: &DocumentPayload) -> intent_core::Result<()> {
        Ok(())
    }
}

/// Bootstrap a project inside the temp directory and build the router.
fn app(dir: &TempDir) -> axum::Router {
    let config = Hub::init(dir.path(), "test-project").unwrap();
    let hub = Hub::open_with(dir.path(), config, Arc::new(FakeDocs)).unwrap();
    intent_server::build_router(Arc::new(hub))
}

fn stage(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(".intent/docs-queue").join(name), content).unwrap();
}

/// Send a GET request via `oneshot` and return (status, parsed JSON body).
async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// Send a POST request with a JSON body via `oneshot` and return (status, parsed JSON body).
async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_returns_ok_envelope_and_logs() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(
        &app,
        "/api/execute",
        json!({"action": "assign_task", "args": {"payload": {"cmd": "noop"}}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "result": {"task_id": "T1"}}));

    let (status, log) = get(&app, "/api/log?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let records = log.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["action"], "assign_task");
    assert_eq!(records[0]["source"], "http");
    assert_eq!(records[0]["outcome"]["status"], "success");
}

#[tokio::test]
async fn execute_unknown_action_is_404_envelope() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, body) = post_json(&app, "/api/execute", json!({"action": "nope"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["kind"], "unknown_action");
}

#[tokio::test]
async fn execute_schema_violation_is_400_and_logged() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, body) = post_json(
        &app,
        "/api/execute",
        json!({"action": "task_status", "args": {}, "source": "agent"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "schema_violation");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("task_id"));

    let (_, log) = get(&app, "/api/log").await;
    assert_eq!(log[0]["source"], "agent");
    assert_eq!(log[0]["outcome"]["kind"], "schema_violation");
}

#[tokio::test]
async fn intent_blocks_unlisted_action_with_409() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, _) = post_json(
        &app,
        "/api/execute",
        json!({"action": "activate_intent", "args": {
            "intent": "triage",
            "allowed_actions": ["list_tasks"]
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/api/execute",
        json!({"action": "assign_task", "args": {"payload": {}}}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "action_not_allowed");

    let (status, _) = post_json(&app, "/api/execute", json!({"action": "list_tasks"})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, log) = get(&app, "/api/log?limit=10").await;
    let records = log.as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1]["outcome"]["kind"], "action_not_allowed");
}

#[tokio::test]
async fn actions_are_self_describing() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, body) = get(&app, "/api/actions").await;
    assert_eq!(status, StatusCode::OK);
    let assign = body
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["name"] == "assign_task")
        .unwrap();
    assert_eq!(assign["input_schema"]["required"], json!(["payload"]));
    assert_eq!(assign["schema"]["params"]["payload"]["type"], "object");
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_lifecycle_over_http() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = post_json(&app, "/api/tasks", json!({"payload": {"cmd": "noop"}})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "T1");

    let (_, claimed) = post_json(&app, "/api/tasks/claim", json!({})).await;
    assert_eq!(claimed["id"], "T1");
    assert_eq!(claimed["status"], "in_progress");

    let (_, result) = get(&app, "/api/tasks/T1/result").await;
    assert_eq!(result, Value::Null);

    let (status, _) =
        post_json(&app, "/api/tasks/T1/complete", json!({"result": {"ok": true}})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, task) = get(&app, "/api/tasks/T1").await;
    assert_eq!(task["status"], "completed");
    assert_eq!(task["result"], json!({"ok": true}));

    // Terminal tasks cannot be completed again.
    let (status, body) =
        post_json(&app, "/api/tasks/T1/complete", json!({"result": "again"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["kind"], "invalid_transition");

    let (_, empty) = post_json(&app, "/api/tasks/claim", json!({})).await;
    assert_eq!(empty, Value::Null);
}

#[tokio::test]
async fn unknown_task_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, body) = get(&app, "/api/tasks/T42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "unknown_task");
}

#[tokio::test]
async fn cancel_and_list_with_filter() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    for _ in 0..3 {
        post_json(&app, "/api/tasks", json!({"payload": {}})).await;
    }
    let (status, cancelled) = post_json(&app, "/api/tasks/T2/cancel", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, pending) = get(&app, "/api/tasks?status=pending").await;
    let ids: Vec<&str> = pending
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["T1", "T3"]);

    let (status, _) = get(&app, "/api/tasks?status=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fail_task_records_error() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    post_json(&app, "/api/tasks", json!({"payload": {}})).await;
    post_json(&app, "/api/tasks/claim", json!({})).await;
    let (status, task) =
        post_json(&app, "/api/tasks/T1/fail", json!({"error": "worker crashed"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "failed");
    assert_eq!(task["result"], json!({"error": "worker crashed"}));
}

// ---------------------------------------------------------------------------
// Document queue
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_doc_from_queue_completes() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    stage(&dir, "hello.md", "# Hello\n\nBody\n");

    let (status, entry) = post_json(&app, "/api/docs/hello", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["status"], "completed");
    assert_eq!(entry["external_doc_id"], "doc-hello");
}

#[tokio::test]
async fn update_without_target_ends_failed() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    stage(&dir, "update-hello.md", "# Hello\n");

    let (status, entry) = post_json(&app, "/api/docs/update-hello", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["status"], "failed");
    assert_eq!(entry["error"]["kind"], "missing_target");

    let (status, entry) = post_json(&app, "/api/docs/update-hello/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["status"], "pending");
}

#[tokio::test]
async fn process_queue_reports_both_outcomes() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    stage(&dir, "a.md", "# Alpha\n");
    stage(&dir, "b.md", "# Reject\n");

    let (status, report) = post_json(&app, "/api/docs/process", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["completed"].as_array().unwrap().len(), 1);
    assert_eq!(report["failed"][0]["entry_key"], "b");
    assert_eq!(report["failed"][0]["error"]["kind"], "collaborator");

    let (_, entries) = get(&app, "/api/docs").await;
    assert_eq!(entries.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_entry_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let (status, body) = post_json(&app, "/api/docs/ghost", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "unknown_entry");
}
