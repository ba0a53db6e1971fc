use crate::output::print_json;
use anyhow::Context;
use intent_core::{paths, Hub};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = match name {
        Some(n) => n.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string()),
    };

    let existed = paths::config_path(root).exists();
    let config = Hub::init(root, &project_name)
        .with_context(|| format!("failed to initialize {}", root.display()))?;
    let staging = paths::staging_dir(root, &config.documents.staging_dir);

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "project": config.project.name,
            "created": !existed,
            "staging_dir": staging,
        }))?;
        return Ok(());
    }

    println!("Initializing intent hub in: {}", root.display());
    if existed {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        println!("  created: {}", paths::CONFIG_FILE);
    }
    println!("  staging: {}", staging.display());
    for w in config.validate() {
        println!("  warning: {}", w.message);
    }
    Ok(())
}
