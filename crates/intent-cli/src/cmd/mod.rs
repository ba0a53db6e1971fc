pub mod actions;
pub mod docs;
pub mod exec;
pub mod init;
pub mod log;
pub mod mcp;
pub mod serve;
pub mod task;

use anyhow::Context;
use intent_core::Hub;
use serde_json::Value;
use std::path::Path;

/// Open the hub rooted at `root`, pointing at `intent init` when missing.
pub fn open_hub(root: &Path) -> anyhow::Result<Hub> {
    Hub::open(root).with_context(|| {
        format!(
            "cannot open intent project at {} (run `intent init` first?)",
            root.display()
        )
    })
}

/// Parse a JSON command-line value, naming the flag on failure.
pub fn parse_json(flag: &str, text: &str) -> anyhow::Result<Value> {
    serde_json::from_str(text).with_context(|| format!("--{flag} is not valid JSON"))
}
