use super::open_hub;
use crate::output::{print_json, print_table, truncate};
use intent_core::execution_log::Outcome;
use std::path::Path;

pub fn run(root: &Path, limit: usize, json: bool) -> anyhow::Result<()> {
    let hub = open_hub(root)?;
    let records = hub.dispatcher().log().tail(limit)?;

    if json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No executions recorded.");
        return Ok(());
    }

    let rows = records
        .iter()
        .map(|r| {
            let outcome = match &r.outcome {
                Outcome::Success { .. } => "ok".to_string(),
                Outcome::Failure { kind, message } => {
                    format!("{kind}: {}", truncate(message, 50))
                }
            };
            vec![
                r.seq.to_string(),
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.action.clone(),
                r.source.clone().unwrap_or_default(),
                format!("{}ms", r.duration_ms),
                outcome,
            ]
        })
        .collect();
    print_table(&["SEQ", "TIME", "ACTION", "SOURCE", "TOOK", "OUTCOME"], rows);
    Ok(())
}
