//! Built-in actions over the task queue, the document queue, and the
//! thread intent.
//!
//! Each action declares its schema here and deserializes the validated
//! arguments into its own typed struct, so handlers never touch raw maps.

use crate::doc_queue::DocQueue;
use crate::error::Result;
use crate::intent_lock::{AllowedActions, IntentLock};
use crate::registry::{ActionDescriptor, Registry};
use crate::schema::{ActionSchema, ParamSpec, ParamType, ValidatedArgs};
use crate::task_queue::{TaskDb, TaskId, TaskStatus};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Typed arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AssignTask {
    payload: Map<String, Value>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskRef {
    task_id: TaskId,
}

#[derive(Debug, Deserialize)]
struct CompleteTask {
    task_id: TaskId,
    result: Value,
}

#[derive(Debug, Deserialize)]
struct FailTask {
    task_id: TaskId,
    error: String,
}

#[derive(Debug, Deserialize)]
struct UpdateTask {
    task_id: TaskId,
    payload: Option<Map<String, Value>>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListTasks {
    status: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EntryRef {
    entry_key: String,
}

#[derive(Debug, Deserialize)]
struct ActivateIntent {
    intent: String,
    allowed_actions: Option<AllowedActions>,
    description: Option<String>,
}

fn task_id_param() -> ParamSpec {
    ParamSpec::required(ParamType::String).describe("Task id, e.g. T1")
}

fn entry_key_param() -> ParamSpec {
    ParamSpec::required(ParamType::String)
        .describe("Staged artifact file name without the .md extension")
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register the task queue, document queue, and thread intent actions.
pub fn register_builtins(
    registry: &mut Registry,
    tasks: Arc<TaskDb>,
    docs: Arc<DocQueue>,
    intent: Arc<IntentLock>,
) -> Result<()> {
    register_task_actions(registry, tasks)?;
    register_doc_actions(registry, docs)?;
    register_intent_actions(registry, intent)?;
    Ok(())
}

fn register_task_actions(registry: &mut Registry, tasks: Arc<TaskDb>) -> Result<()> {
    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "assign_task",
        "Queue a long-running task and return its id; poll task_status for completion",
        ActionSchema::new()
            .param(
                "payload",
                ParamSpec::required(ParamType::Object).describe("What the worker should do"),
            )
            .param("description", ParamSpec::optional(ParamType::String)),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: AssignTask = args.parse()?;
            let task = db.enqueue(Value::Object(a.payload), a.description)?;
            Ok(json!({ "task_id": task.id }))
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "task_status",
        "Snapshot of a queued task",
        ActionSchema::new().param("task_id", task_id_param()),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: TaskRef = args.parse()?;
            Ok(serde_json::to_value(db.status(a.task_id)?)?)
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "task_result",
        "Result of a finished task, or null while it is still running",
        ActionSchema::new().param("task_id", task_id_param()),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: TaskRef = args.parse()?;
            Ok(db.result(a.task_id)?.unwrap_or(Value::Null))
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "claim_next",
        "Claim the oldest pending task for execution, or null when none is pending",
        ActionSchema::new(),
        move |_: &ValidatedArgs| -> anyhow::Result<Value> {
            Ok(serde_json::to_value(db.claim_next()?)?)
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "complete_task",
        "Record the result of a claimed task",
        ActionSchema::new()
            .param("task_id", task_id_param())
            .param("result", ParamSpec::required(ParamType::Any)),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: CompleteTask = args.parse()?;
            Ok(serde_json::to_value(db.complete(a.task_id, a.result)?)?)
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "fail_task",
        "Mark a claimed task as failed",
        ActionSchema::new()
            .param("task_id", task_id_param())
            .param("error", ParamSpec::required(ParamType::String)),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: FailTask = args.parse()?;
            Ok(serde_json::to_value(db.fail(a.task_id, &a.error)?)?)
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "cancel_task",
        "Cancel a task that has not been claimed yet",
        ActionSchema::new().param("task_id", task_id_param()),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: TaskRef = args.parse()?;
            Ok(serde_json::to_value(db.cancel(a.task_id)?)?)
        },
    ))?;

    let db = Arc::clone(&tasks);
    registry.register(ActionDescriptor::new(
        "update_task",
        "Edit a pending task; payload keys are merged into the existing payload",
        ActionSchema::new()
            .param("task_id", task_id_param())
            .param("payload", ParamSpec::optional(ParamType::Object))
            .param("description", ParamSpec::optional(ParamType::String)),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: UpdateTask = args.parse()?;
            Ok(serde_json::to_value(db.update(
                a.task_id,
                a.payload,
                a.description,
            )?)?)
        },
    ))?;

    let db = tasks;
    registry.register(ActionDescriptor::new(
        "list_tasks",
        "List tasks in creation order",
        ActionSchema::new()
            .param(
                "status",
                ParamSpec::optional(ParamType::String)
                    .describe("pending, in_progress, completed, failed or cancelled"),
            )
            .param("limit", ParamSpec::optional(ParamType::Integer)),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: ListTasks = args.parse()?;
            let status = a
                .status
                .as_deref()
                .map(str::parse::<TaskStatus>)
                .transpose()?;
            Ok(serde_json::to_value(db.list(status, a.limit)?)?)
        },
    ))?;

    Ok(())
}

fn register_doc_actions(registry: &mut Registry, docs: Arc<DocQueue>) -> Result<()> {
    let q = Arc::clone(&docs);
    registry.register(ActionDescriptor::new(
        "create_doc_from_queue",
        "Submit one staged document to the document store",
        ActionSchema::new().param("entry_key", entry_key_param()),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: EntryRef = args.parse()?;
            Ok(serde_json::to_value(q.create_doc_from_queue(&a.entry_key)?)?)
        },
    ))?;

    let q = Arc::clone(&docs);
    registry.register(ActionDescriptor::new(
        "process_doc_queue",
        "Submit every pending staged document and report which completed or failed",
        ActionSchema::new(),
        move |_: &ValidatedArgs| -> anyhow::Result<Value> {
            Ok(serde_json::to_value(q.process_queue()?)?)
        },
    ))?;

    let q = Arc::clone(&docs);
    registry.register(ActionDescriptor::new(
        "list_doc_queue",
        "Scan the staging directory and list every document queue entry",
        ActionSchema::new(),
        move |_: &ValidatedArgs| -> anyhow::Result<Value> {
            Ok(serde_json::to_value(q.list()?)?)
        },
    ))?;

    let q = docs;
    registry.register(ActionDescriptor::new(
        "reset_doc_entry",
        "Return a failed or stuck document entry to pending",
        ActionSchema::new().param("entry_key", entry_key_param()),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: EntryRef = args.parse()?;
            Ok(serde_json::to_value(q.reset(&a.entry_key)?)?)
        },
    ))?;

    Ok(())
}

fn register_intent_actions(registry: &mut Registry, intent: Arc<IntentLock>) -> Result<()> {
    let lock = Arc::clone(&intent);
    registry.register(ActionDescriptor::new(
        "activate_intent",
        "Restrict the actions this project may run to an intent's allowlist",
        ActionSchema::new()
            .param(
                "intent",
                ParamSpec::required(ParamType::String)
                    .describe("Intent name; looked up in config unless allowed_actions is given"),
            )
            .param(
                "allowed_actions",
                ParamSpec::optional(ParamType::Any)
                    .describe("\"*\" or a list of action names"),
            )
            .param("description", ParamSpec::optional(ParamType::String)),
        move |args: &ValidatedArgs| -> anyhow::Result<Value> {
            let a: ActivateIntent = args.parse()?;
            Ok(serde_json::to_value(lock.activate(
                &a.intent,
                a.allowed_actions,
                a.description,
            )?)?)
        },
    ))?;

    let lock = Arc::clone(&intent);
    registry.register(ActionDescriptor::new(
        "deactivate_intent",
        "Clear the active intent so every action is allowed again",
        ActionSchema::new(),
        move |_: &ValidatedArgs| -> anyhow::Result<Value> {
            let previous = lock.deactivate()?;
            Ok(json!({
                "previous_intent": previous.intent,
                "violations_count": previous.violations_count,
            }))
        },
    ))?;

    let lock = Arc::clone(&intent);
    registry.register(ActionDescriptor::new(
        "get_active_intent",
        "The active intent and its allowlist",
        ActionSchema::new(),
        move |_: &ValidatedArgs| -> anyhow::Result<Value> {
            Ok(serde_json::to_value(lock.current()?)?)
        },
    ))?;

    let lock = intent;
    registry.register(ActionDescriptor::new(
        "list_intents",
        "Intents configured for activate_intent",
        ActionSchema::new(),
        move |_: &ValidatedArgs| -> anyhow::Result<Value> {
            Ok(serde_json::to_value(lock.catalog())?)
        },
    ))?;

    Ok(())
}
