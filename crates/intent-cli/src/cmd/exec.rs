use super::{open_hub, parse_json};
use crate::output::print_json;
use intent_core::dispatch::ExecutionResponse;
use std::path::Path;

pub fn run(root: &Path, action: &str, args: &str, source: &str, json: bool) -> anyhow::Result<()> {
    let args = parse_json("args", args)?;
    let hub = open_hub(root)?;
    let result = hub.dispatcher().dispatch(action, args, Some(source));

    if json {
        let response = ExecutionResponse::from_result(&result);
        print_json(&response)?;
        if response.is_ok() {
            return Ok(());
        }
    }
    let value = result?;
    print_json(&value)
}
