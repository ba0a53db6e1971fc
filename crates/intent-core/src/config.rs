use crate::error::{HubError, Result};
use crate::intent_lock::{AllowedActions, IntentDef};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on a single handler invocation.
    #[serde(default = "default_handler_timeout")]
    pub handler_timeout_secs: u64,
    /// Program used to run manifest scripts.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
}

fn default_handler_timeout() -> u64 {
    200
}

fn default_interpreter() -> String {
    "python3".to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout_secs: default_handler_timeout(),
            interpreter: default_interpreter(),
        }
    }
}

// ---------------------------------------------------------------------------
// TasksConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default = "default_recovery_max_age")]
    pub recovery_max_age_secs: u64,
}

fn default_recovery_max_age() -> u64 {
    3600
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            recovery_max_age_secs: default_recovery_max_age(),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsConfig {
    #[serde(default = "default_staging_dir")]
    pub staging_dir: String,
    /// Collection name → external collection id.
    #[serde(default)]
    pub collections: BTreeMap<String, String>,
    /// Collection name or id used when an artifact names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_collection: Option<String>,
    #[serde(default = "default_publish")]
    pub publish: bool,
    #[serde(default)]
    pub idempotency_keys: bool,
}

fn default_staging_dir() -> String {
    paths::DEFAULT_STAGING_DIR.to_string()
}

fn default_publish() -> bool {
    true
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            collections: BTreeMap::new(),
            default_collection: None,
            publish: default_publish(),
            idempotency_keys: false,
        }
    }
}

impl DocumentsConfig {
    /// Map a collection name or id to a configured collection id.
    pub fn resolve_collection(&self, name_or_id: &str) -> Option<&str> {
        if let Some(id) = self.collections.get(name_or_id) {
            return Some(id.as_str());
        }
        self.collections
            .values()
            .find(|id| id.as_str() == name_or_id)
            .map(|id| id.as_str())
    }

    /// The default collection id, if one is configured and resolvable.
    ///
    /// An unconfigured name is passed through as a raw id.
    pub fn default_collection_id(&self) -> Option<String> {
        let name = self.default_collection.as_deref()?;
        Some(
            self.resolve_collection(name)
                .map(str::to_string)
                .unwrap_or_else(|| name.to_string()),
        )
    }
}

// ---------------------------------------------------------------------------
// CollaboratorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_secs: u64,
}

fn default_token_env() -> String {
    "INTENT_DOCS_TOKEN".to_string()
}

fn default_scope() -> String {
    "documents".to_string()
}

fn default_collaborator_timeout() -> u64 {
    30
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
            scope: default_scope(),
            timeout_secs: default_collaborator_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub collaborator: CollaboratorConfig,
    /// Named action allowlists that `activate_intent` can switch to.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub intents: BTreeMap<String, IntentDef>,
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            dispatch: DispatchConfig::default(),
            tasks: TasksConfig::default(),
            documents: DocumentsConfig::default(),
            collaborator: CollaboratorConfig::default(),
            intents: BTreeMap::new(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(HubError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.dispatch.handler_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "dispatch.handler_timeout_secs is 0; every handler would time out"
                    .to_string(),
            });
        }
        if self.collaborator.timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "collaborator.timeout_secs is 0; every submission would time out"
                    .to_string(),
            });
        }

        for (name, id) in &self.documents.collections {
            if id.trim().is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("collection '{name}' has an empty id"),
                });
            }
        }

        if let Some(default) = &self.documents.default_collection {
            if self.documents.resolve_collection(default).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "default_collection '{default}' names no configured collection; \
                         it will be sent as a raw id"
                    ),
                });
            }
        }

        if let Some(url) = &self.collaborator.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("collaborator.base_url '{url}' is not an http(s) URL"),
                });
            }
        }

        for (name, def) in &self.intents {
            if let AllowedActions::Pattern(p) = &def.allowed_actions {
                if p != "*" {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Warning,
                        message: format!(
                            "intent '{name}' allows the single action '{p}'; use a list or \"*\""
                        ),
                    });
                }
            }
        }

        warnings
    }
}
