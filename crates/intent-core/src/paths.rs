use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const INTENT_DIR: &str = ".intent";
pub const DEFAULT_STAGING_DIR: &str = ".intent/docs-queue";

pub const CONFIG_FILE: &str = ".intent/config.yaml";
pub const MANIFEST_FILE: &str = ".intent/actions.ndjson";
pub const EXECUTION_LOG_FILE: &str = ".intent/execution-log.ndjson";
pub const TASKS_DB_FILE: &str = ".intent/tasks.db";
pub const DOC_QUEUE_FILE: &str = ".intent/doc-queue.json";
pub const THREAD_INTENT_FILE: &str = ".intent/thread-intent.json";

/// Prefix on a staged artifact's file name that selects Update mode.
pub const UPDATE_PREFIX: &str = "update-";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn intent_dir(root: &Path) -> PathBuf {
    root.join(INTENT_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

pub fn execution_log_path(root: &Path) -> PathBuf {
    root.join(EXECUTION_LOG_FILE)
}

pub fn tasks_db_path(root: &Path) -> PathBuf {
    root.join(TASKS_DB_FILE)
}

pub fn doc_queue_path(root: &Path) -> PathBuf {
    root.join(DOC_QUEUE_FILE)
}

pub fn thread_intent_path(root: &Path) -> PathBuf {
    root.join(THREAD_INTENT_FILE)
}

/// Resolve a configured staging directory; relative paths hang off `root`.
pub fn staging_dir(root: &Path, configured: &str) -> PathBuf {
    let p = Path::new(configured);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}
