use super::entry::DocQueueEntry;
use crate::error::Result;
use crate::io;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// On-disk index of every staged artifact, keyed by entry key.
///
/// Rewritten whole via `atomic_write` so a crash leaves the previous index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocIndex {
    #[serde(default)]
    pub entries: BTreeMap<String, DocQueueEntry>,
}

impl DocIndex {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        io::atomic_write(path, &data)
    }
}
