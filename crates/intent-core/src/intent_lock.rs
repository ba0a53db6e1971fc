//! Thread intent: an optional allowlist narrowing which actions may run.
//!
//! The active intent lives in `.intent/thread-intent.json`. A missing file
//! means no intent is active and every action is allowed. The file is
//! rewritten whole with `atomic_write` under a process-wide mutex.

use crate::error::{HubError, Result};
use crate::io;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Actions that stay callable under any intent so a narrowed session can
/// always inspect and leave it.
pub const ALWAYS_ALLOWED: &[&str] = &["get_active_intent", "deactivate_intent"];

/// Intent name written when no intent is active.
pub const FREE_WORK: &str = "free_work";

/// `"*"` or an explicit list of action names. A `"*"` inside the list also
/// allows everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedActions {
    Pattern(String),
    Names(Vec<String>),
}

impl AllowedActions {
    pub fn any() -> Self {
        AllowedActions::Pattern("*".to_string())
    }

    pub fn permits(&self, action: &str) -> bool {
        match self {
            AllowedActions::Pattern(p) => p == "*" || p == action,
            AllowedActions::Names(names) => names.iter().any(|n| n == "*" || n == action),
        }
    }

    fn describe(&self) -> String {
        match self {
            AllowedActions::Pattern(p) => p.clone(),
            AllowedActions::Names(names) => names.join(", "),
        }
    }
}

impl Default for AllowedActions {
    fn default() -> Self {
        Self::any()
    }
}

/// A named allowlist from the `intents` section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDef {
    pub allowed_actions: AllowedActions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Persisted state of `.intent/thread-intent.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadIntent {
    pub active: bool,
    pub intent: String,
    #[serde(default)]
    pub allowed_actions: AllowedActions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub violations_count: u64,
}

impl ThreadIntent {
    pub fn free_work() -> Self {
        Self {
            active: false,
            intent: FREE_WORK.to_string(),
            allowed_actions: AllowedActions::any(),
            description: None,
            started_at: None,
            violations_count: 0,
        }
    }

    pub fn permits(&self, action: &str) -> bool {
        !self.active || ALWAYS_ALLOWED.contains(&action) || self.allowed_actions.permits(action)
    }
}

pub struct IntentLock {
    path: PathBuf,
    catalog: BTreeMap<String, IntentDef>,
    lock: Mutex<()>,
}

impl IntentLock {
    pub fn new(path: PathBuf, catalog: BTreeMap<String, IntentDef>) -> Self {
        Self {
            path,
            catalog,
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| HubError::Io(std::io::Error::other("thread intent lock poisoned")))
    }

    pub fn catalog(&self) -> &BTreeMap<String, IntentDef> {
        &self.catalog
    }

    /// The active intent, or free work when the file is missing or empty.
    pub fn current(&self) -> Result<ThreadIntent> {
        let _g = self.guard()?;
        self.load()
    }

    /// Reject `action` when an active intent does not allow it.
    ///
    /// A rejection bumps `violations_count`. Actions in [`ALWAYS_ALLOWED`]
    /// pass without reading the file, so an unreadable file still blocks
    /// everything else but can be cleared.
    pub fn check(&self, action: &str) -> Result<()> {
        if ALWAYS_ALLOWED.contains(&action) {
            return Ok(());
        }
        let _g = self.guard()?;
        let mut state = self.load()?;
        if state.permits(action) {
            return Ok(());
        }
        state.violations_count += 1;
        if let Err(e) = self.save(&state) {
            warn!(error = %e, "failed to record intent violation");
        }
        warn!(
            action,
            intent = %state.intent,
            violations = state.violations_count,
            "action blocked by thread intent"
        );
        Err(HubError::ActionNotAllowed {
            action: action.to_string(),
            intent: state.intent,
            allowed: state.allowed_actions.describe(),
        })
    }

    /// Activate `name`. An explicit `allowed` list wins; otherwise the name
    /// must be in the configured catalog.
    pub fn activate(
        &self,
        name: &str,
        allowed: Option<AllowedActions>,
        description: Option<String>,
    ) -> Result<ThreadIntent> {
        let (allowed_actions, description) = match allowed {
            Some(a) => (a, description),
            None => {
                let def = self.catalog.get(name).ok_or_else(|| {
                    let known: Vec<&str> = self.catalog.keys().map(String::as_str).collect();
                    HubError::schema(
                        "intent",
                        format!(
                            "unknown intent '{name}' and no allowed_actions given; configured: [{}]",
                            known.join(", ")
                        ),
                    )
                })?;
                (
                    def.allowed_actions.clone(),
                    description.or_else(|| def.description.clone()),
                )
            }
        };
        let state = ThreadIntent {
            active: true,
            intent: name.to_string(),
            allowed_actions,
            description,
            started_at: Some(Utc::now()),
            violations_count: 0,
        };
        let _g = self.guard()?;
        self.save(&state)?;
        info!(intent = name, allowed = %state.allowed_actions.describe(), "thread intent activated");
        Ok(state)
    }

    /// Return to free work. Returns the intent that was active before.
    pub fn deactivate(&self) -> Result<ThreadIntent> {
        let _g = self.guard()?;
        let previous = self.load().unwrap_or_else(|e| {
            warn!(error = %e, "discarding unreadable thread intent");
            ThreadIntent::free_work()
        });
        self.save(&ThreadIntent::free_work())?;
        info!(intent = %previous.intent, "thread intent reset");
        Ok(previous)
    }

    fn load(&self) -> Result<ThreadIntent> {
        if !self.path.exists() {
            return Ok(ThreadIntent::free_work());
        }
        let data = std::fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(ThreadIntent::free_work());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, state: &ThreadIntent) -> Result<()> {
        let data = serde_json::to_vec_pretty(state)?;
        io::atomic_write(&self.path, &data)
    }
}
