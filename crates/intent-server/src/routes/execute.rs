use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use intent_core::dispatch::ExecutionResponse;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{status_for, AppError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExecuteBody {
    pub action: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub source: Option<String>,
}

/// POST /api/execute: dispatch one action.
///
/// The body is always the `{status, result | error}` envelope; the HTTP
/// status reflects the error kind.
pub async fn execute(
    State(app): State<AppState>,
    Json(body): Json<ExecuteBody>,
) -> Result<(StatusCode, Json<ExecutionResponse>), AppError> {
    let source = body.source.unwrap_or_else(|| "http".to_string());
    let result = app
        .blocking(move |hub| {
            Ok(hub
                .dispatcher()
                .dispatch(&body.action, body.args, Some(source.as_str())))
        })
        .await?;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    Ok((status, Json(ExecutionResponse::from_result(&result))))
}
