use crate::error::HubError;
use crate::paths::UPDATE_PREFIX;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    Create,
    Update,
}

impl EntryMode {
    /// The `update-` file name prefix is the only signal for Update mode.
    pub fn from_key(key: &str) -> Self {
        if key.starts_with(UPDATE_PREFIX) {
            EntryMode::Update
        } else {
            EntryMode::Create
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Processing => "processing",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryError {
    pub kind: String,
    pub message: String,
}

impl From<&HubError> for EntryError {
    fn from(err: &HubError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocQueueEntry {
    pub entry_key: String,
    pub source_path: PathBuf,
    pub mode: EntryMode,
    #[serde(default)]
    pub target_doc_id: Option<String>,
    pub status: EntryStatus,
    #[serde(default)]
    pub title: Option<String>,
    pub content_hash: String,
    #[serde(default)]
    pub external_doc_id: Option<String>,
    #[serde(default)]
    pub error: Option<EntryError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl DocQueueEntry {
    pub fn new(key: &str, source_path: PathBuf, content_hash: String) -> Self {
        let now = Utc::now();
        Self {
            entry_key: key.to_string(),
            source_path,
            mode: EntryMode::from_key(key),
            target_doc_id: None,
            status: EntryStatus::Pending,
            title: None,
            content_hash,
            external_doc_id: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Key of the Create entry an Update entry refers to.
    pub fn base_key(&self) -> Option<&str> {
        self.entry_key.strip_prefix(UPDATE_PREFIX)
    }

    pub(crate) fn set_status(&mut self, status: EntryStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Outcome of draining the queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueReport {
    pub completed: Vec<DocQueueEntry>,
    pub failed: Vec<DocQueueEntry>,
}
