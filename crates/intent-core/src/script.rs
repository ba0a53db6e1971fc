//! Script-backed handlers for manifest actions.
//!
//! # Protocol
//! The script is invoked as `<interpreter> <script> <action> --params <json>`
//! with the project root as working directory and `INTENT_ROOT` set. It must
//! write a single JSON document to stdout and exit 0. Stderr is inherited so
//! script log lines reach the host's terminal.

use crate::registry::ActionHandler;
use crate::schema::ValidatedArgs;
use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ScriptHandler {
    interpreter: String,
    script: PathBuf,
    action: String,
    root: PathBuf,
}

impl ScriptHandler {
    pub fn new(
        interpreter: impl Into<String>,
        script: impl Into<PathBuf>,
        action: impl Into<String>,
        root: &Path,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            action: action.into(),
            root: root.to_path_buf(),
        }
    }

    fn command(&self, params: &str) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .arg(&self.action)
            .arg("--params")
            .arg(params)
            .env("INTENT_ROOT", &self.root)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl ActionHandler for ScriptHandler {
    fn call(&self, args: &ValidatedArgs) -> anyhow::Result<Value> {
        if !self.script.exists() {
            bail!("script not found: {}", self.script.display());
        }
        let params = serde_json::to_string(args.as_map())?;
        debug!(script = %self.script.display(), action = %self.action, "running script");

        let output = self
            .command(&params)
            .output()
            .with_context(|| format!("failed to spawn '{}'", self.interpreter))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let hint: String = stdout.chars().take(500).collect();
            return Err(anyhow!(
                "script exited with {}: {}",
                output.status,
                hint.trim()
            ));
        }
        serde_json::from_str(stdout.trim()).with_context(|| {
            let hint: String = stdout.chars().take(200).collect();
            format!("script output is not JSON: {}", hint.trim())
        })
    }
}
