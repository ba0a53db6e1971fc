//! Process-wide wiring: one registry, dispatcher, task queue, and document
//! queue, built once from a project root and passed around by reference.

use crate::collaborator::{DocumentCollaborator, HttpDocumentClient, UnconfiguredCollaborator};
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::doc_queue::DocQueue;
use crate::error::{HubError, Result};
use crate::execution_log::ExecutionLog;
use crate::handlers;
use crate::intent_lock::IntentLock;
use crate::registry::Registry;
use crate::task_queue::TaskDb;
use crate::{io, paths};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct Hub {
    root: PathBuf,
    config: Config,
    dispatcher: Dispatcher,
    tasks: Arc<TaskDb>,
    docs: Arc<DocQueue>,
}

impl Hub {
    /// Create `.intent/` with a fresh config and staging directory.
    /// Existing files are left alone. Returns the effective config.
    pub fn init(root: &Path, project_name: &str) -> Result<Config> {
        io::ensure_dir(&paths::intent_dir(root))?;
        let config = match Config::load(root) {
            Ok(existing) => existing,
            Err(HubError::NotInitialized) => {
                let cfg = Config::new(project_name);
                cfg.save(root)?;
                cfg
            }
            Err(e) => return Err(e),
        };
        io::ensure_dir(&paths::staging_dir(root, &config.documents.staging_dir))?;
        io::write_if_missing(&paths::manifest_path(root), b"")?;
        io::ensure_gitignore_entry(root, paths::TASKS_DB_FILE)?;
        info!(root = %root.display(), "initialized");
        Ok(config)
    }

    /// Open with the configured collaborator.
    ///
    /// Builds a blocking HTTP client; call outside of an async runtime.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let collaborator = collaborator_from_config(&config)?;
        Self::open_with(root, config, collaborator)
    }

    pub fn open_with(
        root: &Path,
        config: Config,
        collaborator: Arc<dyn DocumentCollaborator>,
    ) -> Result<Self> {
        for w in config.validate() {
            warn!(level = ?w.level, "config: {}", w.message);
        }

        let tasks = Arc::new(TaskDb::open(&paths::tasks_db_path(root))?);
        let recovered = tasks.startup_recovery(Duration::from_secs(
            config.tasks.recovery_max_age_secs,
        ))?;
        if recovered > 0 {
            warn!(recovered, "failed stale in-progress tasks on startup");
        }

        let docs = Arc::new(DocQueue::new(
            paths::staging_dir(root, &config.documents.staging_dir),
            paths::doc_queue_path(root),
            config.documents.clone(),
            collaborator,
        ));

        let intent = Arc::new(IntentLock::new(
            paths::thread_intent_path(root),
            config.intents.clone(),
        ));

        let mut registry = Registry::new();
        handlers::register_builtins(
            &mut registry,
            Arc::clone(&tasks),
            Arc::clone(&docs),
            Arc::clone(&intent),
        )?;
        let loaded = registry.load_manifest(
            &paths::manifest_path(root),
            root,
            &config.dispatch.interpreter,
        )?;
        info!(
            actions = registry.len(),
            from_manifest = loaded,
            "action registry ready"
        );

        let log = ExecutionLog::open(paths::execution_log_path(root))?;
        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            log,
            Duration::from_secs(config.dispatch.handler_timeout_secs),
        )
        .with_intent_lock(intent);

        Ok(Self {
            root: root.to_path_buf(),
            config,
            dispatcher,
            tasks,
            docs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn tasks(&self) -> &TaskDb {
        &self.tasks
    }

    pub fn docs(&self) -> &DocQueue {
        &self.docs
    }
}

/// An HTTP client when `collaborator.base_url` is set, otherwise a stand-in
/// that fails every submission with a `collaborator` error.
pub fn collaborator_from_config(config: &Config) -> Result<Arc<dyn DocumentCollaborator>> {
    match &config.collaborator.base_url {
        Some(url) => Ok(Arc::new(HttpDocumentClient::from_config(
            &config.collaborator,
            url,
        )?)),
        None => Ok(Arc::new(UnconfiguredCollaborator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::DocumentPayload;
    use crate::dispatch::ExecutionResponse;
    use crate::intent_lock::{AllowedActions, IntentDef};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    struct EchoDocs;

    impl DocumentCollaborator for EchoDocs {
        fn create_document(&self, payload: &DocumentPayload) -> Result<String> {
            Ok(format!("doc-{}", payload.title.to_lowercase()))
        }

        fn update_document(&self, _id: &str, _payload: &DocumentPayload) -> Result<()> {
            Ok(())
        }
    }

    fn hub() -> (TempDir, Hub) {
        let dir = TempDir::new().unwrap();
        let config = Hub::init(dir.path(), "demo").unwrap();
        let hub = Hub::open_with(dir.path(), config, Arc::new(EchoDocs)).unwrap();
        (dir, hub)
    }

    fn ok(resp: ExecutionResponse) -> Value {
        match resp {
            ExecutionResponse::Ok { result } => result,
            ExecutionResponse::Error { error } => panic!("{}: {}", error.kind, error.message),
        }
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        Hub::init(dir.path(), "first").unwrap();
        let cfg = Hub::init(dir.path(), "second").unwrap();
        assert_eq!(cfg.project.name, "first");
        assert!(dir.path().join(".intent/docs-queue").is_dir());
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(gitignore.contains(".intent/tasks.db"));
    }

    #[test]
    fn open_without_init_fails() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Hub::open(dir.path()),
            Err(HubError::NotInitialized)
        ));
    }

    #[test]
    fn builtins_are_registered() {
        let (_dir, hub) = hub();
        let names: Vec<String> = hub
            .dispatcher()
            .list_actions()
            .iter()
            .map(|d| d.name.clone())
            .collect();
        for expected in [
            "assign_task",
            "task_status",
            "task_result",
            "claim_next",
            "complete_task",
            "fail_task",
            "cancel_task",
            "update_task",
            "list_tasks",
            "create_doc_from_queue",
            "process_doc_queue",
            "list_doc_queue",
            "reset_doc_entry",
            "activate_intent",
            "deactivate_intent",
            "get_active_intent",
            "list_intents",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn task_lifecycle_through_dispatcher() {
        let (_dir, hub) = hub();
        let d = hub.dispatcher();
        let assigned = ok(d.execute("assign_task", json!({"payload": {"cmd": "noop"}})));
        assert_eq!(assigned, json!({"task_id": "T1"}));

        let claimed = ok(d.execute("claim_next", json!({})));
        assert_eq!(claimed["id"], "T1");
        assert_eq!(claimed["status"], "in_progress");

        assert_eq!(
            ok(d.execute("task_result", json!({"task_id": "T1"}))),
            Value::Null
        );
        ok(d.execute(
            "complete_task",
            json!({"task_id": "T1", "result": {"ok": true}}),
        ));
        let status = ok(d.execute("task_status", json!({"task_id": "T1"})));
        assert_eq!(status["status"], "completed");
        assert_eq!(status["result"], json!({"ok": true}));

        assert_eq!(ok(d.execute("claim_next", json!({}))), Value::Null);
        assert_eq!(d.log().len().unwrap(), 6);
    }

    #[test]
    fn handler_errors_surface_as_handler_error() {
        let (_dir, hub) = hub();
        let resp = hub
            .dispatcher()
            .execute("task_status", json!({"task_id": "T404"}));
        match resp {
            ExecutionResponse::Error { error } => {
                assert_eq!(error.kind, "handler_error");
                assert!(error.message.contains("unknown task: T404"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn list_tasks_rejects_bad_status() {
        let (_dir, hub) = hub();
        let resp = hub
            .dispatcher()
            .execute("list_tasks", json!({"status": "done"}));
        assert!(!resp.is_ok());
    }

    #[test]
    fn document_action_through_dispatcher() {
        let (dir, hub) = hub();
        std::fs::write(
            dir.path().join(".intent/docs-queue/hello.md"),
            "# Hello\nbody",
        )
        .unwrap();
        let entry = ok(hub
            .dispatcher()
            .execute("create_doc_from_queue", json!({"entry_key": "hello"})));
        assert_eq!(entry["status"], "completed");
        assert_eq!(entry["external_doc_id"], "doc-hello");
    }

    #[test]
    fn manifest_actions_are_loaded() {
        let dir = TempDir::new().unwrap();
        let config = Hub::init(dir.path(), "demo").unwrap();
        std::fs::write(
            dir.path().join(".intent/actions.ndjson"),
            json!({"name": "ping", "script": "ping.sh"}).to_string(),
        )
        .unwrap();
        let hub = Hub::open_with(dir.path(), config, Arc::new(EchoDocs)).unwrap();
        assert!(hub.dispatcher().registry().resolve("ping").is_ok());
    }

    #[test]
    fn intent_actions_gate_dispatch() {
        let dir = TempDir::new().unwrap();
        let mut config = Hub::init(dir.path(), "demo").unwrap();
        config.intents.insert(
            "docs_only".to_string(),
            IntentDef {
                allowed_actions: AllowedActions::Names(vec!["list_doc_queue".into()]),
                description: None,
            },
        );
        let hub = Hub::open_with(dir.path(), config, Arc::new(EchoDocs)).unwrap();
        let d = hub.dispatcher();

        let state = ok(d.execute("activate_intent", json!({"intent": "docs_only"})));
        assert_eq!(state["active"], true);
        assert!(dir.path().join(".intent/thread-intent.json").is_file());

        assert!(d.execute("list_doc_queue", json!({})).is_ok());
        match d.execute("assign_task", json!({"payload": {}})) {
            ExecutionResponse::Error { error } => assert_eq!(error.kind, "action_not_allowed"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ok(d.execute("get_active_intent", json!({})))["violations_count"], 1);

        let reset = ok(d.execute("deactivate_intent", json!({})));
        assert_eq!(reset["previous_intent"], "docs_only");
        assert!(d.execute("assign_task", json!({"payload": {}})).is_ok());
    }
}
