use axum::extract::{Query, State};
use axum::Json;
use intent_core::execution_log::ExecutionRecord;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// GET /api/log?limit=N: most recent execution records, oldest first.
pub async fn tail_log(
    State(app): State<AppState>,
    Query(q): Query<LogQuery>,
) -> Result<Json<Vec<ExecutionRecord>>, AppError> {
    let limit = q.limit.unwrap_or(50);
    let records = app
        .blocking(move |hub| hub.dispatcher().log().tail(limit))
        .await?;
    Ok(Json(records))
}
