use axum::extract::{Path, Query, State};
use axum::Json;
use intent_core::task_queue::{QueueTask, TaskId, TaskStatus};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::AppError;
use crate::state::AppState;

fn parse_id(id: &str) -> Result<TaskId, AppError> {
    Ok(id.parse::<TaskId>()?)
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/tasks: enqueue a task.
pub async fn assign_task(
    State(app): State<AppState>,
    Json(body): Json<AssignBody>,
) -> Result<Json<Value>, AppError> {
    let task = app
        .blocking(move |hub| {
            hub.tasks()
                .enqueue(Value::Object(body.payload), body.description)
        })
        .await?;
    Ok(Json(json!({ "task_id": task.id })))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/tasks?status=&limit=: tasks in creation order.
pub async fn list_tasks(
    State(app): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<QueueTask>>, AppError> {
    let status = q
        .status
        .as_deref()
        .map(str::parse::<TaskStatus>)
        .transpose()?;
    let tasks = app
        .blocking(move |hub| hub.tasks().list(status, q.limit))
        .await?;
    Ok(Json(tasks))
}

/// POST /api/tasks/claim: claim the oldest pending task, or null.
pub async fn claim_next(
    State(app): State<AppState>,
) -> Result<Json<Option<QueueTask>>, AppError> {
    let task = app.blocking(|hub| hub.tasks().claim_next()).await?;
    Ok(Json(task))
}

/// GET /api/tasks/:id: task snapshot.
pub async fn task_status(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueueTask>, AppError> {
    let id = parse_id(&id)?;
    let task = app.blocking(move |hub| hub.tasks().status(id)).await?;
    Ok(Json(task))
}

/// GET /api/tasks/:id/result: stored result, or null while unfinished.
pub async fn task_result(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    let result = app.blocking(move |hub| hub.tasks().result(id)).await?;
    Ok(Json(result.unwrap_or(Value::Null)))
}

#[derive(Deserialize)]
pub struct CompleteBody {
    pub result: Value,
}

/// POST /api/tasks/:id/complete: record a claimed task's result.
pub async fn complete_task(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CompleteBody>,
) -> Result<Json<QueueTask>, AppError> {
    let id = parse_id(&id)?;
    let task = app
        .blocking(move |hub| hub.tasks().complete(id, body.result))
        .await?;
    Ok(Json(task))
}

#[derive(Deserialize)]
pub struct FailBody {
    pub error: String,
}

/// POST /api/tasks/:id/fail: mark a claimed task failed.
pub async fn fail_task(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<FailBody>,
) -> Result<Json<QueueTask>, AppError> {
    let id = parse_id(&id)?;
    let task = app
        .blocking(move |hub| hub.tasks().fail(id, &body.error))
        .await?;
    Ok(Json(task))
}

/// POST /api/tasks/:id/cancel: cancel a pending task.
pub async fn cancel_task(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueueTask>, AppError> {
    let id = parse_id(&id)?;
    let task = app.blocking(move |hub| hub.tasks().cancel(id)).await?;
    Ok(Json(task))
}
