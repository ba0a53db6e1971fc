use crate::error::{HubError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Monotonic task id, rendered as `T<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('T').unwrap_or(s);
        digits
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(TaskId)
            .ok_or_else(|| HubError::UnknownTask(s.to_string()))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(HubError::schema(
                "status",
                format!("unknown task status '{other}'"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// QueueTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTask {
    pub id: TaskId,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl QueueTask {
    pub(crate) fn new(id: TaskId, payload: Value, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            payload,
            description,
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            updated_at: now,
            completed_at: None,
            result: None,
        }
    }

    /// Move to `to`, enforcing the lifecycle:
    /// Pending → InProgress | Cancelled, InProgress → Completed | Failed.
    /// Terminal states never change.
    pub(crate) fn transition(&mut self, to: TaskStatus, result: Option<Value>) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::Pending, TaskStatus::Cancelled)
                | (TaskStatus::InProgress, TaskStatus::Completed)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        );
        if !allowed {
            let reason = if self.status.is_terminal() {
                format!("task {} is already {}", self.id, self.status)
            } else {
                format!("task {} is {}", self.id, self.status)
            };
            return Err(HubError::InvalidTransition {
                from: self.status.to_string(),
                to: to.to_string(),
                reason,
            });
        }
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        match to {
            TaskStatus::InProgress => self.started_at = Some(now),
            _ => {
                self.completed_at = Some(now);
                self.result = result;
            }
        }
        Ok(())
    }
}
