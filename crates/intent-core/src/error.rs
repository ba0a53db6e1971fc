use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("not initialized: run 'intent init'")]
    NotInitialized,

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("action already registered: {0}")]
    DuplicateAction(String),

    #[error("action is locked: {0}")]
    ActionLocked(String),

    #[error("action '{action}' is not allowed under intent '{intent}'; allowed: {allowed}")]
    ActionNotAllowed {
        action: String,
        intent: String,
        allowed: String,
    },

    #[error("schema violation on '{field}': {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("handler for '{action}' failed: {cause}")]
    HandlerError { action: String, cause: String },

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("unknown queue entry: {0}")]
    UnknownEntry(String),

    #[error("malformed entry '{key}': {reason}")]
    MalformedEntry { key: String, reason: String },

    #[error("no target document for '{0}'")]
    MissingTarget(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("task queue error: {0}")]
    QueueDb(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HubError {
    /// Stable tag persisted in execution records and document entries.
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::NotInitialized => "not_initialized",
            HubError::UnknownAction(_) => "unknown_action",
            HubError::DuplicateAction(_) => "duplicate_action",
            HubError::ActionLocked(_) => "action_locked",
            HubError::ActionNotAllowed { .. } => "action_not_allowed",
            HubError::SchemaViolation { .. } => "schema_violation",
            HubError::HandlerError { .. } => "handler_error",
            HubError::InvalidTransition { .. } => "invalid_transition",
            HubError::UnknownTask(_) => "unknown_task",
            HubError::UnknownEntry(_) => "unknown_entry",
            HubError::MalformedEntry { .. } => "malformed_entry",
            HubError::MissingTarget(_) => "missing_target",
            HubError::Collaborator(_) => "collaborator",
            HubError::Timeout(_) => "timeout",
            HubError::QueueDb(_) => "queue_db",
            HubError::Io(_) => "io",
            HubError::Yaml(_) => "yaml",
            HubError::Json(_) => "json",
        }
    }

    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        HubError::SchemaViolation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn db(err: impl std::fmt::Display) -> Self {
        HubError::QueueDb(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_snake_case() {
        let errors = [
            HubError::UnknownAction("x".into()),
            HubError::schema("title", "required field is missing"),
            HubError::MissingTarget("update-hello".into()),
            HubError::Timeout(30),
        ];
        for err in errors {
            let kind = err.kind();
            assert!(
                kind.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "bad kind: {kind}"
            );
        }
    }

    #[test]
    fn schema_violation_names_field() {
        let err = HubError::schema("task_id", "required field is missing");
        assert_eq!(
            err.to_string(),
            "schema violation on 'task_id': required field is missing"
        );
    }
}
