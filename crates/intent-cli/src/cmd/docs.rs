use super::open_hub;
use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use intent_core::doc_queue::{DocQueueEntry, EntryStatus};
use std::path::Path;

#[derive(Subcommand)]
pub enum DocsSubcommand {
    /// Index the staging directory and list pending entries
    Scan,
    /// List every indexed entry
    List,
    /// Show one entry
    Show { key: String },
    /// Submit one staged artifact
    Run { key: String },
    /// Submit every pending entry
    Process,
    /// Return a failed or stuck entry to pending
    Reset { key: String },
}

pub fn run(root: &Path, subcmd: DocsSubcommand, json: bool) -> anyhow::Result<()> {
    let hub = open_hub(root)?;
    let docs = hub.docs();

    match subcmd {
        DocsSubcommand::Scan => list(&docs.scan_pending()?, json),
        DocsSubcommand::List => list(&docs.list()?, json),
        DocsSubcommand::Show { key } => show(&docs.get(&key)?, json),
        DocsSubcommand::Run { key } => {
            let entry = docs.create_doc_from_queue(&key)?;
            show(&entry, json)?;
            if entry.status == EntryStatus::Failed && !json {
                anyhow::bail!("entry '{key}' failed");
            }
            Ok(())
        }
        DocsSubcommand::Process => {
            let report = docs.process_queue()?;
            if json {
                return print_json(&report);
            }
            println!(
                "Processed {} entries: {} completed, {} failed",
                report.completed.len() + report.failed.len(),
                report.completed.len(),
                report.failed.len()
            );
            for e in &report.failed {
                if let Some(err) = &e.error {
                    println!("  {}: {} ({})", e.entry_key, err.message, err.kind);
                }
            }
            Ok(())
        }
        DocsSubcommand::Reset { key } => {
            let entry = docs.reset(&key)?;
            if json {
                return print_json(&entry);
            }
            println!("Entry '{}' is now {}", entry.entry_key, entry.status);
            Ok(())
        }
    }
}

fn show(entry: &DocQueueEntry, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(entry);
    }
    println!("Entry '{}'", entry.entry_key);
    println!("  status: {}", entry.status);
    println!("  source: {}", entry.source_path.display());
    if let Some(t) = &entry.title {
        println!("  title:  {t}");
    }
    if let Some(id) = &entry.target_doc_id {
        println!("  target: {id}");
    }
    if let Some(id) = &entry.external_doc_id {
        println!("  doc:    {id}");
    }
    if let Some(err) = &entry.error {
        println!("  error:  {} ({})", err.message, err.kind);
    }
    Ok(())
}

fn list(entries: &[DocQueueEntry], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No staged documents.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.entry_key.clone(),
                e.status.to_string(),
                e.external_doc_id.clone().unwrap_or_default(),
                truncate(e.title.as_deref().unwrap_or(""), 50),
            ]
        })
        .collect();
    print_table(&["KEY", "STATUS", "DOC", "TITLE"], rows);
    Ok(())
}
