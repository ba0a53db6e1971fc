//! The dispatcher: resolve, validate, invoke, record.
//!
//! Every call that reaches [`Dispatcher::dispatch`] appends exactly one
//! [`ExecutionRecord`](crate::execution_log::ExecutionRecord), whether it was
//! rejected up front or failed inside the handler. When the log itself
//! cannot be written the call still returns its result and the failure is
//! reported at `error` level.

use crate::error::{HubError, Result};
use crate::execution_log::{ExecutionLog, Outcome};
use crate::intent_lock::IntentLock;
use crate::registry::{ActionDescriptor, Registry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Caller-facing result envelope: `{status: "ok", result}` or
/// `{status: "error", error: {kind, message}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResponse {
    Ok { result: Value },
    Error { error: ErrorBody },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl From<&HubError> for ErrorBody {
    fn from(err: &HubError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl ExecutionResponse {
    pub fn from_result(result: &Result<Value>) -> Self {
        match result {
            Ok(v) => ExecutionResponse::Ok { result: v.clone() },
            Err(e) => ExecutionResponse::Error { error: e.into() },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ExecutionResponse::Ok { .. })
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    log: ExecutionLog,
    handler_timeout: Duration,
    intent: Option<Arc<IntentLock>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, log: ExecutionLog, handler_timeout: Duration) -> Self {
        Self {
            registry,
            log,
            handler_timeout,
            intent: None,
        }
    }

    /// Gate every call on the active thread intent.
    pub fn with_intent_lock(mut self, intent: Arc<IntentLock>) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn log(&self) -> &ExecutionLog {
        &self.log
    }

    pub fn list_actions(&self) -> Vec<Arc<ActionDescriptor>> {
        self.registry.list()
    }

    /// Dispatch and fold the outcome into a response envelope. Never fails.
    pub fn execute(&self, action: &str, args: Value) -> ExecutionResponse {
        ExecutionResponse::from_result(&self.dispatch(action, args, None))
    }

    /// Dispatch `action` with `args`, tagging the log record with `source`.
    pub fn dispatch(&self, action: &str, args: Value, source: Option<&str>) -> Result<Value> {
        let started = Instant::now();
        let result = self.run(action, &args);
        let elapsed = started.elapsed().as_millis() as u64;

        let outcome = match &result {
            Ok(v) => Outcome::Success { result: v.clone() },
            Err(e) => Outcome::failure(e),
        };
        match &result {
            Ok(_) => info!(action, duration_ms = elapsed, "dispatched"),
            Err(e) => info!(action, kind = e.kind(), error = %e, "dispatch failed"),
        }
        if let Err(e) = self.log.append(action, args, source, elapsed, outcome) {
            error!(action, error = %e, "failed to append execution record");
        }
        result
    }

    fn run(&self, action: &str, args: &Value) -> Result<Value> {
        let descriptor = self.registry.resolve(action)?;
        if let Some(intent) = &self.intent {
            intent.check(action)?;
        }
        if descriptor.locked {
            return Err(HubError::ActionLocked(action.to_string()));
        }
        let validated = descriptor.schema.validate(args)?;

        let handler = Arc::clone(&descriptor.handler);
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name(format!("action-{action}"))
            .spawn(move || {
                let _ = tx.send(handler.call(&validated));
            })?;

        match rx.recv_timeout(self.handler_timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(HubError::HandlerError {
                action: action.to_string(),
                cause: format!("{e:#}"),
            }),
            Err(RecvTimeoutError::Timeout) => Err(HubError::HandlerError {
                action: action.to_string(),
                cause: HubError::Timeout(self.handler_timeout.as_secs()).to_string(),
            }),
            Err(RecvTimeoutError::Disconnected) => Err(HubError::HandlerError {
                action: action.to_string(),
                cause: "handler panicked".to_string(),
            }),
        }
    }
}
