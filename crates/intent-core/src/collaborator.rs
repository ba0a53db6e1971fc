//! External document store consumed by the document queue.
//!
//! The core treats every collaborator call as fallible, timeout-bounded,
//! and of unknown idempotency.

use crate::config::CollaboratorConfig;
use crate::error::{HubError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    /// `None` means the token does not expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

pub trait TokenProvider: Send + Sync {
    fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// Reads a long-lived token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl TokenProvider for EnvTokenProvider {
    fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Ok(AccessToken {
                token,
                expires_at: None,
            }),
            _ => Err(HubError::Collaborator(format!(
                "environment variable {} is not set",
                self.var
            ))),
        }
    }
}

/// A fixed token, for tests and embedding.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self, _scope: &str) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.0.clone(),
            expires_at: None,
        })
    }
}

// ---------------------------------------------------------------------------
// DocumentCollaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub title: String,
    pub text: String,
    pub collection_id: Option<String>,
    pub parent_document_id: Option<String>,
    pub publish: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

pub trait DocumentCollaborator: Send + Sync {
    /// Create a document and return its external id.
    fn create_document(&self, payload: &DocumentPayload) -> Result<String>;

    fn update_document(&self, id: &str, payload: &DocumentPayload) -> Result<()>;
}

/// Stand-in used when no `collaborator.base_url` is configured.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredCollaborator;

impl DocumentCollaborator for UnconfiguredCollaborator {
    fn create_document(&self, _payload: &DocumentPayload) -> Result<String> {
        Err(unconfigured())
    }

    fn update_document(&self, _id: &str, _payload: &DocumentPayload) -> Result<()> {
        Err(unconfigured())
    }
}

fn unconfigured() -> HubError {
    HubError::Collaborator("collaborator.base_url is not configured".to_string())
}

// ---------------------------------------------------------------------------
// HttpDocumentClient
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct UpdateBody<'a> {
    id: &'a str,
    #[serde(flatten)]
    payload: &'a DocumentPayload,
}

/// Blocking HTTP client for a `documents.create` / `documents.update` API.
pub struct HttpDocumentClient {
    base_url: String,
    scope: String,
    timeout: Duration,
    tokens: Arc<dyn TokenProvider>,
    client: reqwest::blocking::Client,
}

impl HttpDocumentClient {
    pub fn new(
        base_url: impl Into<String>,
        scope: impl Into<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HubError::Collaborator(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scope: scope.into(),
            timeout,
            tokens,
            client,
        })
    }

    pub fn from_config(cfg: &CollaboratorConfig, base_url: &str) -> Result<Self> {
        Self::new(
            base_url,
            cfg.scope.clone(),
            Duration::from_secs(cfg.timeout_secs),
            Arc::new(EnvTokenProvider::new(cfg.token_env.clone())),
        )
    }

    fn post(&self, method: &str, body: &impl Serialize) -> Result<Value> {
        let token = self.tokens.get_token(&self.scope)?;
        if token.is_expired() {
            return Err(HubError::Collaborator(format!(
                "access token for scope '{}' has expired",
                self.scope
            )));
        }
        let url = format!("{}/{method}", self.base_url);
        debug!(%url, "collaborator request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token.token)
            .json(body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            let hint: String = text.chars().take(300).collect();
            return Err(HubError::Collaborator(format!(
                "{method} returned {status}: {}",
                hint.trim()
            )));
        }
        resp.json::<Value>().map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, e: reqwest::Error) -> HubError {
        if e.is_timeout() {
            HubError::Timeout(self.timeout.as_secs())
        } else {
            HubError::Collaborator(e.to_string())
        }
    }
}

impl DocumentCollaborator for HttpDocumentClient {
    fn create_document(&self, payload: &DocumentPayload) -> Result<String> {
        let body = self.post("documents.create", payload)?;
        body.pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                HubError::Collaborator("documents.create response has no data.id".to_string())
            })
    }

    fn update_document(&self, id: &str, payload: &DocumentPayload) -> Result<()> {
        self.post("documents.update", &UpdateBody { id, payload })?;
        Ok(())
    }
}
