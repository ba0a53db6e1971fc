use super::open_hub;
use crate::output::{print_json, print_table, truncate};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let hub = open_hub(root)?;
    let actions = hub.dispatcher().list_actions();

    if json {
        let list: Vec<_> = actions
            .iter()
            .map(|a| {
                serde_json::json!({
                    "name": a.name,
                    "description": a.description,
                    "locked": a.locked,
                    "input_schema": a.schema.to_json_schema(),
                })
            })
            .collect();
        return print_json(&list);
    }

    let rows = actions
        .iter()
        .map(|a| {
            let mut params: Vec<String> = a
                .schema
                .params
                .iter()
                .map(|(name, spec)| {
                    if spec.required {
                        name.clone()
                    } else {
                        format!("[{name}]")
                    }
                })
                .collect();
            if !a.schema.strict {
                params.push("...".to_string());
            }
            vec![
                a.name.clone(),
                if a.locked { "locked" } else { "" }.to_string(),
                params.join(" "),
                truncate(&a.description, 60),
            ]
        })
        .collect();
    print_table(&["ACTION", "", "PARAMS", "DESCRIPTION"], rows);
    Ok(())
}
