use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use intent_core::error::HubError;

/// HTTP status for a core error.
pub fn status_for(err: &HubError) -> StatusCode {
    match err {
        HubError::UnknownAction(_) | HubError::UnknownTask(_) | HubError::UnknownEntry(_) => {
            StatusCode::NOT_FOUND
        }
        HubError::SchemaViolation { .. } => StatusCode::BAD_REQUEST,
        HubError::DuplicateAction(_)
        | HubError::ActionLocked(_)
        | HubError::ActionNotAllowed { .. } => StatusCode::CONFLICT,
        HubError::InvalidTransition { .. }
        | HubError::MalformedEntry { .. }
        | HubError::MissingTarget(_) => StatusCode::UNPROCESSABLE_ENTITY,
        HubError::HandlerError { .. } | HubError::Collaborator(_) => StatusCode::BAD_GATEWAY,
        HubError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        HubError::NotInitialized
        | HubError::QueueDb(_)
        | HubError::Io(_)
        | HubError::Yaml(_)
        | HubError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match self.0.downcast_ref::<HubError>() {
            Some(e) => (status_for(e), e.kind()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let body = serde_json::json!({
            "error": {
                "kind": kind,
                "message": self.0.to_string(),
            }
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
