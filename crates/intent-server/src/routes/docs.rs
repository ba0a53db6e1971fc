use axum::extract::{Path, State};
use axum::Json;
use intent_core::doc_queue::{DocQueueEntry, QueueReport};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/docs: scan the staging directory and list every entry.
pub async fn list_entries(
    State(app): State<AppState>,
) -> Result<Json<Vec<DocQueueEntry>>, AppError> {
    let entries = app.blocking(|hub| hub.docs().list()).await?;
    Ok(Json(entries))
}

/// POST /api/docs/process: drain every pending entry.
pub async fn process_queue(State(app): State<AppState>) -> Result<Json<QueueReport>, AppError> {
    let report = app.blocking(|hub| hub.docs().process_queue()).await?;
    Ok(Json(report))
}

/// POST /api/docs/:key: submit one staged document.
pub async fn create_doc(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DocQueueEntry>, AppError> {
    let entry = app
        .blocking(move |hub| hub.docs().create_doc_from_queue(&key))
        .await?;
    Ok(Json(entry))
}

/// POST /api/docs/:key/reset: return a failed or stuck entry to pending.
pub async fn reset_entry(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DocQueueEntry>, AppError> {
    let entry = app.blocking(move |hub| hub.docs().reset(&key)).await?;
    Ok(Json(entry))
}
