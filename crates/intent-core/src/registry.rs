//! Action registry: stable action name → handler, schema, description.
//!
//! Built once at process start and shared by reference; descriptors are
//! immutable after registration.

use crate::error::{HubError, Result};
use crate::schema::{ActionSchema, ParamSpec, ValidatedArgs};
use crate::script::ScriptHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// ActionHandler
// ---------------------------------------------------------------------------

/// The concrete implementation bound to an action.
///
/// Handlers receive arguments that already passed the action's schema. Any
/// error they return is wrapped by the dispatcher as `HandlerError`.
pub trait ActionHandler: Send + Sync {
    fn call(&self, args: &ValidatedArgs) -> anyhow::Result<Value>;
}

impl<F> ActionHandler for F
where
    F: Fn(&ValidatedArgs) -> anyhow::Result<Value> + Send + Sync,
{
    fn call(&self, args: &ValidatedArgs) -> anyhow::Result<Value> {
        self(args)
    }
}

// ---------------------------------------------------------------------------
// ActionDescriptor
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ActionSchema,
    /// Listed for discovery but rejected at dispatch.
    pub locked: bool,
    #[serde(skip)]
    pub handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl ActionDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ActionSchema,
        handler: impl ActionHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            locked: false,
            handler: Arc::new(handler),
        }
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One line of `.intent/actions.ndjson`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub script: String,
    /// Sub-command passed to the script; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
    #[serde(default = "default_strict")]
    pub strict: bool,
    #[serde(default)]
    pub locked: bool,
}

fn default_strict() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Registry {
    actions: BTreeMap<String, Arc<ActionDescriptor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ActionDescriptor) -> Result<Arc<ActionDescriptor>> {
        if self.actions.contains_key(&descriptor.name) {
            return Err(HubError::DuplicateAction(descriptor.name));
        }
        debug!(action = %descriptor.name, "registered action");
        let descriptor = Arc::new(descriptor);
        self.actions
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<ActionDescriptor>> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| HubError::UnknownAction(name.to_string()))
    }

    /// All descriptors, sorted by name.
    pub fn list(&self) -> Vec<Arc<ActionDescriptor>> {
        self.actions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Register every script-backed action listed in an NDJSON manifest.
    ///
    /// A missing manifest registers nothing. Blank and unparseable lines are
    /// skipped with a warning; a name collision aborts with `DuplicateAction`.
    /// Returns the number of actions registered.
    pub fn load_manifest(&mut self, path: &Path, root: &Path, interpreter: &str) -> Result<usize> {
        if !path.exists() {
            return Ok(0);
        }
        let content = std::fs::read_to_string(path)?;
        let mut count = 0;
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: ManifestEntry = match serde_json::from_str(line) {
                Ok(e) => e,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        line = idx + 1,
                        error = %e,
                        "skipping malformed manifest line"
                    );
                    continue;
                }
            };
            let bad_default = entry.params.iter().find(|(_, spec)| {
                spec.default
                    .as_ref()
                    .is_some_and(|d| !spec.ty.accepts(d))
            });
            if let Some((param, spec)) = bad_default {
                warn!(
                    path = %path.display(),
                    line = idx + 1,
                    action = %entry.name,
                    param = %param,
                    expected = spec.ty.as_str(),
                    "skipping manifest action whose default does not match its type"
                );
                continue;
            }
            let handler = ScriptHandler::new(
                interpreter,
                root.join(&entry.script),
                entry.action.clone().unwrap_or_else(|| entry.name.clone()),
                root,
            );
            let schema = ActionSchema {
                params: entry.params,
                strict: entry.strict,
            };
            let descriptor = ActionDescriptor::new(entry.name, entry.description, schema, handler)
                .locked(entry.locked);
            self.register(descriptor)?;
            count += 1;
        }
        Ok(count)
    }
}
