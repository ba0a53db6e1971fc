use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/actions: every registered action with its schema.
pub async fn list_actions(State(app): State<AppState>) -> Result<Json<Value>, AppError> {
    let actions: Vec<Value> = app
        .hub
        .dispatcher()
        .list_actions()
        .iter()
        .map(|d| {
            json!({
                "name": d.name,
                "description": d.description,
                "locked": d.locked,
                "schema": d.schema,
                "input_schema": d.schema.to_json_schema(),
            })
        })
        .collect();
    Ok(Json(Value::Array(actions)))
}
