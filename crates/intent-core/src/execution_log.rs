//! Append-only NDJSON record of every dispatch.

use crate::error::{HubError, Result};
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { result: Value },
    Failure { kind: String, message: String },
}

impl Outcome {
    pub fn failure(err: &HubError) -> Self {
        Outcome::Failure {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub duration_ms: u64,
    pub outcome: Outcome,
}

/// Handle on the log file. `seq` allocation and the append happen under one
/// lock so records land in `seq` order.
#[derive(Debug)]
pub struct ExecutionLog {
    path: PathBuf,
    next_seq: Mutex<u64>,
}

impl ExecutionLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let last = read_records(&path)?.last().map(|r| r.seq).unwrap_or(0);
        Ok(Self {
            path,
            next_seq: Mutex::new(last + 1),
        })
    }

    /// Append a record, assigning its `seq` and timestamp.
    pub fn append(
        &self,
        action: &str,
        args: Value,
        source: Option<&str>,
        duration_ms: u64,
        outcome: Outcome,
    ) -> Result<ExecutionRecord> {
        let mut next = self
            .next_seq
            .lock()
            .map_err(|_| HubError::Io(std::io::Error::other("execution log lock poisoned")))?;
        let record = ExecutionRecord {
            seq: *next,
            timestamp: Utc::now(),
            action: action.to_string(),
            args,
            source: source.map(str::to_string),
            duration_ms,
            outcome,
        };
        let line = serde_json::to_string(&record)?;
        io::append_line(&self.path, &line)?;
        *next += 1;
        debug!(seq = record.seq, action = %record.action, "execution recorded");
        Ok(record)
    }

    /// The last `limit` records in insertion order.
    pub fn tail(&self, limit: usize) -> Result<Vec<ExecutionRecord>> {
        let mut records = read_records(&self.path)?;
        let skip = records.len().saturating_sub(limit);
        Ok(records.split_off(skip))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(read_records(&self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn read_records(path: &Path) -> Result<Vec<ExecutionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ExecutionRecord>(line) {
            Ok(r) => out.push(r),
            Err(e) => warn!(
                path = %path.display(),
                line = idx + 1,
                error = %e,
                "skipping unreadable execution record"
            ),
        }
    }
    Ok(out)
}
