//! Write-then-commit document queue.
//!
//! Plain text artifacts are dropped into a staging directory; a scan indexes
//! them as Pending entries, and `process` turns one entry into a create or
//! update call against the document collaborator:
//!
//! ```text
//! Pending ──▶ Processing ──▶ Completed
//!                        └─▶ Failed ──(reset)──▶ Pending
//! ```
//!
//! Processing is persisted before the external call so a crash leaves a
//! visible marker. Failed entries are never retried automatically.

pub mod entry;
pub mod parse;
pub mod store;

pub use entry::{DocQueueEntry, EntryError, EntryMode, EntryStatus, QueueReport};

use crate::collaborator::{DocumentCollaborator, DocumentPayload};
use crate::config::DocumentsConfig;
use crate::error::{HubError, Result};
use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use store::DocIndex;
use tracing::{debug, info, warn};

/// What a successful submission wrote, as recorded on the entry.
struct Submitted {
    title: String,
    doc_id: String,
    /// Hash of the content actually sent, which may postdate the scan.
    content_hash: String,
}

pub struct DocQueue {
    staging_dir: PathBuf,
    index_path: PathBuf,
    config: DocumentsConfig,
    collaborator: Arc<dyn DocumentCollaborator>,
    /// Serializes read-modify-write cycles on the index file.
    lock: Mutex<()>,
}

impl DocQueue {
    pub fn new(
        staging_dir: PathBuf,
        index_path: PathBuf,
        config: DocumentsConfig,
        collaborator: Arc<dyn DocumentCollaborator>,
    ) -> Self {
        Self {
            staging_dir,
            index_path,
            config,
            collaborator,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| HubError::Io(std::io::Error::other("document queue lock poisoned")))
    }

    // -----------------------------------------------------------------------
    // Scanning
    // -----------------------------------------------------------------------

    /// Index the staging directory and return every Pending entry, by key.
    ///
    /// Re-running a scan reproduces the same set: entries are keyed by file
    /// stem, Processing entries are left untouched, and a Completed or Failed
    /// entry returns to Pending only when its source content changed. A
    /// Pending entry whose source file is gone is dropped from the index.
    pub fn scan_pending(&self) -> Result<Vec<DocQueueEntry>> {
        let _g = self.guard()?;
        let index = self.sync_index()?;
        Ok(index
            .entries
            .into_values()
            .filter(|e| e.status == EntryStatus::Pending)
            .collect())
    }

    /// Scan, then return every indexed entry regardless of status.
    pub fn list(&self) -> Result<Vec<DocQueueEntry>> {
        let _g = self.guard()?;
        Ok(self.sync_index()?.entries.into_values().collect())
    }

    pub fn get(&self, key: &str) -> Result<DocQueueEntry> {
        DocIndex::load(&self.index_path)?
            .entries
            .remove(key)
            .ok_or_else(|| HubError::UnknownEntry(key.to_string()))
    }

    fn sync_index(&self) -> Result<DocIndex> {
        let mut index = DocIndex::load(&self.index_path)?;
        let mut changed = false;
        let staged = self.staged_files()?;
        let present: BTreeSet<&str> = staged.iter().map(|(k, _)| k.as_str()).collect();

        let vanished: Vec<String> = index
            .entries
            .values()
            .filter(|e| e.status == EntryStatus::Pending && !present.contains(e.entry_key.as_str()))
            .map(|e| e.entry_key.clone())
            .collect();
        for key in vanished {
            info!(entry = %key, "source removed; dropped pending entry");
            index.entries.remove(&key);
            changed = true;
        }

        for (key, path) in staged {
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable artifact");
                    continue;
                }
            };
            let hash = parse::content_hash(&content);

            match index.entries.get_mut(&key) {
                None => {
                    debug!(entry = %key, "indexed new artifact");
                    index
                        .entries
                        .insert(key.clone(), DocQueueEntry::new(&key, path, hash));
                    changed = true;
                }
                Some(entry) if entry.content_hash == hash => {}
                Some(entry) => match entry.status {
                    EntryStatus::Processing => {}
                    EntryStatus::Pending => {
                        entry.content_hash = hash;
                        entry.source_path = path;
                        entry.updated_at = Utc::now();
                        changed = true;
                    }
                    EntryStatus::Completed | EntryStatus::Failed => {
                        info!(entry = %key, previous = %entry.status, "source changed; re-queued");
                        entry.content_hash = hash;
                        entry.source_path = path;
                        entry.error = None;
                        entry.completed_at = None;
                        entry.set_status(EntryStatus::Pending);
                        changed = true;
                    }
                },
            }
        }

        if changed {
            index.save(&self.index_path)?;
        }
        Ok(index)
    }

    /// `*.md` files in the staging directory as (stem, path), sorted by stem.
    fn staged_files(&self) -> Result<Vec<(String, PathBuf)>> {
        if !self.staging_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for dirent in std::fs::read_dir(&self.staging_dir)? {
            let path = dirent?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.push((stem.to_string(), path.clone()));
            }
        }
        files.sort();
        Ok(files)
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    /// Scan so a freshly written artifact is indexed, then process it.
    pub fn create_doc_from_queue(&self, key: &str) -> Result<DocQueueEntry> {
        self.scan_pending()?;
        self.process(key)
    }

    /// Submit one Pending entry.
    ///
    /// Only failures to start (unknown key, entry not Pending, index I/O)
    /// return `Err`. Failures after the Processing marker is written are
    /// recorded on the entry, which is returned as Failed.
    pub fn process(&self, key: &str) -> Result<DocQueueEntry> {
        let entry = self.begin(key)?;
        let outcome = self.submit(&entry);
        self.finish(key, outcome)
    }

    /// Drain every Pending entry, continuing past individual failures.
    ///
    /// Create entries run before Update entries so an update staged alongside
    /// its base document can resolve the freshly created id.
    pub fn process_queue(&self) -> Result<QueueReport> {
        let mut report = QueueReport::default();
        let mut pending = self.scan_pending()?;
        pending.sort_by_key(|e| e.mode == EntryMode::Update);
        for pending in pending {
            match self.process(&pending.entry_key) {
                Ok(e) if e.status == EntryStatus::Completed => report.completed.push(e),
                Ok(e) => report.failed.push(e),
                Err(e) => {
                    warn!(entry = %pending.entry_key, error = %e, "entry could not be started");
                }
            }
        }
        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "document queue drained"
        );
        Ok(report)
    }

    /// Move a Processing or Failed entry back to Pending.
    pub fn reset(&self, key: &str) -> Result<DocQueueEntry> {
        let _g = self.guard()?;
        let mut index = DocIndex::load(&self.index_path)?;
        let entry = index
            .entries
            .get_mut(key)
            .ok_or_else(|| HubError::UnknownEntry(key.to_string()))?;
        if !matches!(entry.status, EntryStatus::Processing | EntryStatus::Failed) {
            return Err(HubError::InvalidTransition {
                from: entry.status.to_string(),
                to: EntryStatus::Pending.to_string(),
                reason: format!("only processing or failed entries can be reset; '{key}' is {}", entry.status),
            });
        }
        entry.error = None;
        entry.set_status(EntryStatus::Pending);
        let entry = entry.clone();
        index.save(&self.index_path)?;
        info!(entry = %key, "entry reset to pending");
        Ok(entry)
    }

    fn begin(&self, key: &str) -> Result<DocQueueEntry> {
        let _g = self.guard()?;
        let mut index = DocIndex::load(&self.index_path)?;
        let entry = index
            .entries
            .get_mut(key)
            .ok_or_else(|| HubError::UnknownEntry(key.to_string()))?;
        if entry.status != EntryStatus::Pending {
            return Err(HubError::InvalidTransition {
                from: entry.status.to_string(),
                to: EntryStatus::Processing.to_string(),
                reason: format!("entry '{key}' is not pending"),
            });
        }
        entry.error = None;
        entry.set_status(EntryStatus::Processing);
        let entry = entry.clone();
        index.save(&self.index_path)?;
        debug!(entry = %key, "entry marked processing");
        Ok(entry)
    }

    /// Parse, resolve, and call the collaborator.
    fn submit(&self, entry: &DocQueueEntry) -> Result<Submitted> {
        let key = entry.entry_key.as_str();
        let content = std::fs::read_to_string(&entry.source_path)?;
        let content_hash = parse::content_hash(&content);
        let parsed = parse::parse_artifact(key, &content, &self.config)?;

        let idempotency_key = (self.config.idempotency_keys && entry.mode == EntryMode::Create)
            .then(|| format!("{key}-{}", &content_hash[..16.min(content_hash.len())]));
        let payload = DocumentPayload {
            title: parsed.title.clone(),
            text: parsed.body,
            collection_id: parsed.collection_id,
            parent_document_id: parsed.parent_document_id,
            publish: self.config.publish,
            idempotency_key,
        };

        let doc_id = match entry.mode {
            EntryMode::Update => {
                let target = match parsed.target_doc_id {
                    Some(id) => id,
                    None => self
                        .lookup_target(entry)?
                        .ok_or_else(|| HubError::MissingTarget(key.to_string()))?,
                };
                self.collaborator.update_document(&target, &payload)?;
                target
            }
            // A re-queued Create whose document already exists rewrites it.
            EntryMode::Create => match &entry.external_doc_id {
                Some(existing) => {
                    self.collaborator.update_document(existing, &payload)?;
                    existing.clone()
                }
                None => self.collaborator.create_document(&payload)?,
            },
        };
        Ok(Submitted {
            title: parsed.title,
            doc_id,
            content_hash,
        })
    }

    fn lookup_target(&self, entry: &DocQueueEntry) -> Result<Option<String>> {
        if let Some(id) = &entry.target_doc_id {
            return Ok(Some(id.clone()));
        }
        let Some(base) = entry.base_key() else {
            return Ok(None);
        };
        let index = DocIndex::load(&self.index_path)?;
        Ok(index
            .entries
            .get(base)
            .and_then(|e| e.external_doc_id.clone()))
    }

    fn finish(&self, key: &str, outcome: Result<Submitted>) -> Result<DocQueueEntry> {
        let _g = self.guard()?;
        let mut index = DocIndex::load(&self.index_path)?;
        let entry = index
            .entries
            .get_mut(key)
            .ok_or_else(|| HubError::UnknownEntry(key.to_string()))?;
        match outcome {
            Ok(Submitted {
                title,
                doc_id,
                content_hash,
            }) => {
                info!(entry = %key, doc = %doc_id, "document submitted");
                entry.title = Some(title);
                entry.content_hash = content_hash;
                if entry.mode == EntryMode::Update {
                    entry.target_doc_id = Some(doc_id.clone());
                }
                entry.external_doc_id = Some(doc_id);
                entry.error = None;
                entry.completed_at = Some(Utc::now());
                entry.set_status(EntryStatus::Completed);
            }
            Err(e) => {
                warn!(entry = %key, kind = e.kind(), error = %e, "document submission failed");
                entry.error = Some(EntryError::from(&e));
                entry.set_status(EntryStatus::Failed);
            }
        }
        let entry = entry.clone();
        index.save(&self.index_path)?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeDocs {
        created: Mutex<Vec<DocumentPayload>>,
        updated: Mutex<Vec<(String, DocumentPayload)>>,
        next: AtomicUsize,
        fail: bool,
    }

    impl DocumentCollaborator for FakeDocs {
        fn create_document(&self, payload: &DocumentPayload) -> Result<String> {
            if self.fail {
                return Err(HubError::Collaborator("503 service unavailable".into()));
            }
            self.created.lock().unwrap().push(payload.clone());
            Ok(format!("doc-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1))
        }

        fn update_document(&self, id: &str, payload: &DocumentPayload) -> Result<()> {
            if self.fail {
                return Err(HubError::Collaborator("503 service unavailable".into()));
            }
            self.updated
                .lock()
                .unwrap()
                .push((id.to_string(), payload.clone()));
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        docs: Arc<FakeDocs>,
        queue: DocQueue,
    }

    impl Fixture {
        fn write(&self, name: &str, content: &str) {
            std::fs::write(self.dir.path().join("staging").join(name), content).unwrap();
        }

        fn index_path(&self) -> PathBuf {
            self.dir.path().join("doc-queue.json")
        }
    }

    fn fixture_with(docs: FakeDocs, config: DocumentsConfig) -> Fixture {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("staging")).unwrap();
        let docs = Arc::new(docs);
        let queue = DocQueue::new(
            dir.path().join("staging"),
            dir.path().join("doc-queue.json"),
            config,
            docs.clone(),
        );
        Fixture { dir, docs, queue }
    }

    fn fixture() -> Fixture {
        let mut config = DocumentsConfig::default();
        config
            .collections
            .insert("Inbox".into(), "col-inbox".into());
        config.default_collection = Some("Inbox".into());
        fixture_with(FakeDocs::default(), config)
    }

    #[test]
    fn create_mode_end_to_end() {
        let f = fixture();
        f.write("hello.md", "# Hello\n\nWorld\n");
        let entry = f.queue.create_doc_from_queue("hello").unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(entry.mode, EntryMode::Create);
        assert_eq!(entry.external_doc_id.as_deref(), Some("doc-1"));
        assert_eq!(entry.title.as_deref(), Some("Hello"));

        let created = f.docs.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, "Hello");
        assert_eq!(created[0].text, "World");
        assert_eq!(created[0].collection_id.as_deref(), Some("col-inbox"));
        assert!(created[0].publish);
    }

    #[test]
    fn update_without_target_fails_with_missing_target() {
        let f = fixture();
        f.write("update-hello.md", "# Hello again\n");
        let entry = f.queue.create_doc_from_queue("update-hello").unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.error.as_ref().unwrap().kind, "missing_target");
        assert!(f.docs.updated.lock().unwrap().is_empty());
        assert!(f.docs.created.lock().unwrap().is_empty());
    }

    #[test]
    fn update_resolves_target_from_base_entry() {
        let f = fixture();
        f.write("hello.md", "# Hello\nv1");
        f.queue.create_doc_from_queue("hello").unwrap();
        f.write("update-hello.md", "# Hello\nv2");
        let entry = f.queue.create_doc_from_queue("update-hello").unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(entry.external_doc_id.as_deref(), Some("doc-1"));
        let updated = f.docs.updated.lock().unwrap();
        assert_eq!(updated[0].0, "doc-1");
        assert_eq!(updated[0].1.text, "v2");
    }

    #[test]
    fn update_target_from_front_matter() {
        let f = fixture();
        f.write("update-notes.md", "---\ntarget_doc_id: ext-77\n---\n# Notes\nbody");
        let entry = f.queue.create_doc_from_queue("update-notes").unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(f.docs.updated.lock().unwrap()[0].0, "ext-77");
    }

    #[test]
    fn malformed_entry_fails_without_external_call() {
        let f = fixture();
        f.write("notitle.md", "no heading here\n");
        let entry = f.queue.create_doc_from_queue("notitle").unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.error.unwrap().kind, "malformed_entry");
        assert!(f.docs.created.lock().unwrap().is_empty());
    }

    #[test]
    fn collaborator_failure_is_recorded_and_not_retried() {
        let f = fixture_with(
            FakeDocs {
                fail: true,
                ..FakeDocs::default()
            },
            DocumentsConfig::default(),
        );
        f.write("a.md", "# A\n");
        let entry = f.queue.create_doc_from_queue("a").unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.error.unwrap().kind, "collaborator");
        assert!(f.queue.scan_pending().unwrap().is_empty());
    }

    #[test]
    fn completed_entry_is_not_reprocessed() {
        let f = fixture();
        f.write("a.md", "# A\n");
        f.queue.create_doc_from_queue("a").unwrap();
        assert!(f.queue.scan_pending().unwrap().is_empty());
        let err = f.queue.process("a").unwrap_err();
        assert!(matches!(err, HubError::InvalidTransition { .. }));
    }

    #[test]
    fn overwrite_requeues_and_updates_existing_document() {
        let f = fixture();
        f.write("a.md", "# A\nfirst");
        f.queue.create_doc_from_queue("a").unwrap();
        f.write("a.md", "# A\nsecond");
        let pending = f.queue.scan_pending().unwrap();
        assert_eq!(pending.len(), 1);
        let entry = f.queue.process("a").unwrap();
        assert_eq!(entry.status, EntryStatus::Completed);
        assert_eq!(entry.external_doc_id.as_deref(), Some("doc-1"));
        assert_eq!(f.docs.created.lock().unwrap().len(), 1);
        assert_eq!(f.docs.updated.lock().unwrap()[0].0, "doc-1");
    }

    #[test]
    fn processing_entry_survives_rescan_without_duplicate() {
        let f = fixture();
        f.write("a.md", "# A\n");
        f.queue.scan_pending().unwrap();

        // Simulate a crash after the Processing marker was written.
        let mut index = DocIndex::load(&f.index_path()).unwrap();
        index
            .entries
            .get_mut("a")
            .unwrap()
            .set_status(EntryStatus::Processing);
        index.save(&f.index_path()).unwrap();
        f.write("a.md", "# A\nedited while processing");

        assert!(f.queue.scan_pending().unwrap().is_empty());
        let all = f.queue.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, EntryStatus::Processing);

        let reset = f.queue.reset("a").unwrap();
        assert_eq!(reset.status, EntryStatus::Pending);
        assert_eq!(f.queue.process("a").unwrap().status, EntryStatus::Completed);
    }

    #[test]
    fn reset_rejects_completed_and_unknown() {
        let f = fixture();
        f.write("a.md", "# A\n");
        f.queue.create_doc_from_queue("a").unwrap();
        assert!(matches!(
            f.queue.reset("a"),
            Err(HubError::InvalidTransition { .. })
        ));
        assert!(matches!(
            f.queue.reset("zzz"),
            Err(HubError::UnknownEntry(_))
        ));
    }

    #[test]
    fn process_queue_continues_past_failures() {
        let f = fixture();
        f.write("a.md", "# A\n");
        f.write("b.md", "untitled\n");
        f.write("c.md", "# C\n");
        f.write("notes.txt", "ignored");
        let report = f.queue.process_queue().unwrap();
        let done: Vec<_> = report.completed.iter().map(|e| e.entry_key.as_str()).collect();
        assert_eq!(done, vec!["a", "c"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].entry_key, "b");
        assert_eq!(f.queue.list().unwrap().len(), 3);
    }

    #[test]
    fn idempotency_key_on_create_when_enabled() {
        let config = DocumentsConfig {
            idempotency_keys: true,
            ..DocumentsConfig::default()
        };
        let f = fixture_with(FakeDocs::default(), config);
        f.write("a.md", "# A\n");
        f.queue.create_doc_from_queue("a").unwrap();
        let created = f.docs.created.lock().unwrap();
        let key = created[0].idempotency_key.as_deref().unwrap();
        assert!(key.starts_with("a-"));
        assert_eq!(key.len(), "a-".len() + 16);
    }

    #[test]
    fn idempotency_key_tracks_submitted_content() {
        let config = DocumentsConfig {
            idempotency_keys: true,
            ..DocumentsConfig::default()
        };
        let f = fixture_with(FakeDocs::default(), config);
        f.write("a.md", "# A\nv1");
        f.queue.scan_pending().unwrap();
        f.write("a.md", "# A\nv2");
        f.queue.process("a").unwrap();

        let sent = parse::content_hash("# A\nv2");
        let created = f.docs.created.lock().unwrap();
        assert_eq!(
            created[0].idempotency_key.as_deref(),
            Some(format!("a-{}", &sent[..16]).as_str())
        );
    }

    #[test]
    fn deleted_source_drops_pending_entry() {
        let f = fixture();
        f.write("a.md", "# A\n");
        assert_eq!(f.queue.scan_pending().unwrap().len(), 1);

        std::fs::remove_file(f.dir.path().join("staging/a.md")).unwrap();
        assert!(f.queue.scan_pending().unwrap().is_empty());
        assert!(f.queue.list().unwrap().is_empty());
        assert!(matches!(f.queue.process("a"), Err(HubError::UnknownEntry(_))));
    }

    #[test]
    fn deleted_source_keeps_completed_history() {
        let f = fixture();
        f.write("a.md", "# A\n");
        f.queue.create_doc_from_queue("a").unwrap();
        std::fs::remove_file(f.dir.path().join("staging/a.md")).unwrap();

        let all = f.queue.list().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, EntryStatus::Completed);
    }

    #[test]
    fn process_queue_runs_creates_before_updates() {
        let f = fixture();
        // "update-zeta" sorts before "zeta".
        f.write("zeta.md", "# Zeta\nv1");
        f.write("update-zeta.md", "# Zeta\nv2");
        let report = f.queue.process_queue().unwrap();

        let done: Vec<_> = report.completed.iter().map(|e| e.entry_key.as_str()).collect();
        assert_eq!(done, vec!["zeta", "update-zeta"]);
        assert!(report.failed.is_empty());
        assert_eq!(f.docs.updated.lock().unwrap()[0].0, "doc-1");
    }

    #[test]
    fn unknown_entry() {
        let f = fixture();
        assert!(matches!(
            f.queue.create_doc_from_queue("ghost"),
            Err(HubError::UnknownEntry(_))
        ));
    }
}
