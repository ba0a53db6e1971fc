//! Persistent task queue using redb.
//!
//! # Table design
//!
//! `TASKS` is keyed by the numeric part of the task id. Ids are allocated
//! from the `next_id` counter in `META` inside the same write transaction
//! that inserts the task, so key order equals creation order and a plain
//! forward scan is FIFO.
//!
//! redb admits one write transaction at a time. Every state change, claims
//! included, is a read-check-write inside a single write transaction, which
//! makes it atomic with respect to concurrent callers sharing the handle.

use std::{path::Path, time::Duration};

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::error::{HubError, Result};

use super::task::{QueueTask, TaskId, TaskStatus};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: task number. Value: JSON-encoded `QueueTask`.
const TASKS: TableDefinition<u64, &[u8]> = TableDefinition::new("tasks");

/// Small counters; currently only `next_id`.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_ID: &str = "next_id";

// ---------------------------------------------------------------------------
// TaskDb
// ---------------------------------------------------------------------------

pub struct TaskDb {
    db: Database,
}

impl TaskDb {
    /// Open or create the database at `path`, creating both tables.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(HubError::db)?;
        let wt = db.begin_write().map_err(HubError::db)?;
        wt.open_table(TASKS).map_err(HubError::db)?;
        wt.open_table(META).map_err(HubError::db)?;
        wt.commit().map_err(HubError::db)?;
        Ok(Self { db })
    }

    /// Append a new Pending task and return it.
    pub fn enqueue(&self, payload: Value, description: Option<String>) -> Result<QueueTask> {
        let wt = self.db.begin_write().map_err(HubError::db)?;
        let task = {
            let mut meta = wt.open_table(META).map_err(HubError::db)?;
            let next = meta
                .get(NEXT_ID)
                .map_err(HubError::db)?
                .map(|g| g.value())
                .unwrap_or(1);
            meta.insert(NEXT_ID, next + 1).map_err(HubError::db)?;
            QueueTask::new(TaskId(next), payload, description)
        };
        put(&wt, &task)?;
        wt.commit().map_err(HubError::db)?;
        info!(task = %task.id, "task enqueued");
        Ok(task)
    }

    /// Take the oldest Pending task, mark it InProgress, and return it.
    pub fn claim_next(&self) -> Result<Option<QueueTask>> {
        let wt = self.db.begin_write().map_err(HubError::db)?;
        let found = {
            let table = wt.open_table(TASKS).map_err(HubError::db)?;
            let mut found = None;
            for entry in table.iter().map_err(HubError::db)? {
                let (_, v) = entry.map_err(HubError::db)?;
                let task: QueueTask = serde_json::from_slice(v.value())?;
                if task.status == TaskStatus::Pending {
                    found = Some(task);
                    break;
                }
            }
            found
        };
        let Some(mut task) = found else {
            return Ok(None);
        };
        task.transition(TaskStatus::InProgress, None)?;
        put(&wt, &task)?;
        wt.commit().map_err(HubError::db)?;
        info!(task = %task.id, "task claimed");
        Ok(Some(task))
    }

    pub fn complete(&self, id: TaskId, result: Value) -> Result<QueueTask> {
        let task = self.mutate(id, |t| t.transition(TaskStatus::Completed, Some(result)))?;
        info!(task = %id, "task completed");
        Ok(task)
    }

    /// Fail an InProgress task; the message is stored as `{"error": message}`.
    pub fn fail(&self, id: TaskId, error: &str) -> Result<QueueTask> {
        let task = self.mutate(id, |t| {
            t.transition(TaskStatus::Failed, Some(json!({ "error": error })))
        })?;
        info!(task = %id, error, "task failed");
        Ok(task)
    }

    /// Cancel a task that nobody has claimed yet.
    pub fn cancel(&self, id: TaskId) -> Result<QueueTask> {
        let task = self.mutate(id, |t| t.transition(TaskStatus::Cancelled, None))?;
        info!(task = %id, "task cancelled");
        Ok(task)
    }

    /// Edit a Pending task: payload keys are merged shallowly, a new
    /// description replaces the old one.
    pub fn update(
        &self,
        id: TaskId,
        patch: Option<Map<String, Value>>,
        description: Option<String>,
    ) -> Result<QueueTask> {
        self.mutate(id, |t| {
            if t.status != TaskStatus::Pending {
                return Err(HubError::InvalidTransition {
                    from: t.status.to_string(),
                    to: TaskStatus::Pending.to_string(),
                    reason: format!("task {} can only be updated while pending", t.id),
                });
            }
            if let Some(patch) = patch {
                match &mut t.payload {
                    Value::Object(existing) => existing.extend(patch),
                    other => *other = Value::Object(patch),
                }
            }
            if description.is_some() {
                t.description = description;
            }
            t.updated_at = Utc::now();
            Ok(())
        })
    }

    pub fn status(&self, id: TaskId) -> Result<QueueTask> {
        let rt = self.db.begin_read().map_err(HubError::db)?;
        let table = rt.open_table(TASKS).map_err(HubError::db)?;
        let guard = table
            .get(id.0)
            .map_err(HubError::db)?
            .ok_or_else(|| HubError::UnknownTask(id.to_string()))?;
        Ok(serde_json::from_slice(guard.value())?)
    }

    /// The stored result, or `None` while the task has not finished.
    pub fn result(&self, id: TaskId) -> Result<Option<Value>> {
        Ok(self.status(id)?.result)
    }

    /// Tasks in creation order, optionally filtered by status and capped.
    pub fn list(&self, status: Option<TaskStatus>, limit: Option<usize>) -> Result<Vec<QueueTask>> {
        let rt = self.db.begin_read().map_err(HubError::db)?;
        let table = rt.open_table(TASKS).map_err(HubError::db)?;
        let cap = limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for entry in table.iter().map_err(HubError::db)? {
            if out.len() >= cap {
                break;
            }
            let (_, v) = entry.map_err(HubError::db)?;
            let task: QueueTask = serde_json::from_slice(v.value())?;
            if status.map_or(true, |s| s == task.status) {
                out.push(task);
            }
        }
        Ok(out)
    }

    /// Mark InProgress tasks untouched for longer than `max_age` as Failed.
    ///
    /// Returns the number of tasks recovered.
    pub fn startup_recovery(&self, max_age: Duration) -> Result<u32> {
        let cutoff = Utc::now() - chrono::Duration::from_std(max_age).map_err(HubError::db)?;
        let stale: Vec<TaskId> = self
            .list(Some(TaskStatus::InProgress), None)?
            .into_iter()
            .filter(|t| t.updated_at < cutoff)
            .map(|t| t.id)
            .collect();

        let mut count = 0u32;
        for id in stale {
            // A worker may have finished the task since the listing.
            match self.fail(id, "recovered from restart") {
                Ok(_) => {
                    warn!(task = %id, "recovered stale in-progress task");
                    count += 1;
                }
                Err(HubError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    /// Load, modify, and store one task inside a single write transaction.
    /// If `f` fails the transaction is dropped and nothing changes.
    fn mutate(
        &self,
        id: TaskId,
        f: impl FnOnce(&mut QueueTask) -> Result<()>,
    ) -> Result<QueueTask> {
        let wt = self.db.begin_write().map_err(HubError::db)?;
        let mut task: QueueTask = {
            let table = wt.open_table(TASKS).map_err(HubError::db)?;
            let bytes = table
                .get(id.0)
                .map_err(HubError::db)?
                .map(|g| g.value().to_vec())
                .ok_or_else(|| HubError::UnknownTask(id.to_string()))?;
            serde_json::from_slice(&bytes)?
        };
        f(&mut task)?;
        put(&wt, &task)?;
        wt.commit().map_err(HubError::db)?;
        Ok(task)
    }
}

fn put(wt: &WriteTransaction, task: &QueueTask) -> Result<()> {
    let value = serde_json::to_vec(task)?;
    let mut table = wt.open_table(TASKS).map_err(HubError::db)?;
    table
        .insert(task.id.0, value.as_slice())
        .map_err(HubError::db)?;
    debug!(task = %task.id, status = %task.status, "task stored");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
