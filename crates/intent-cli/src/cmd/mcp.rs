use super::open_hub;
use intent_core::dispatch::{Dispatcher, ErrorBody};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::Path;

/// Execution-log source tag for calls arriving over MCP.
const SOURCE: &str = "mcp";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl JsonRpcResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Server loop
// ---------------------------------------------------------------------------

pub fn run(root: &Path) -> anyhow::Result<()> {
    let hub = open_hub(root)?;
    let dispatcher = hub.dispatcher();
    tracing::info!(
        actions = dispatcher.list_actions().len(),
        "mcp bridge ready on stdio"
    );

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Value>(&line) {
            Err(e) => Some(JsonRpcResponse::err(None, -32700, format!("parse error: {e}"))),
            // Notifications carry no id and get no reply.
            Ok(raw) if !raw.as_object().is_some_and(|o| o.contains_key("id")) => None,
            Ok(raw) => Some(match serde_json::from_value::<JsonRpcRequest>(raw) {
                Ok(request) => handle_request(&request, dispatcher),
                Err(e) => JsonRpcResponse::err(None, -32600, format!("invalid request: {e}")),
            }),
        };

        if let Some(response) = response {
            let mut out = stdout.lock();
            serde_json::to_writer(&mut out, &response)?;
            writeln!(out)?;
            out.flush()?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Request dispatch (pub for unit tests)
// ---------------------------------------------------------------------------

pub fn handle_request(req: &JsonRpcRequest, dispatcher: &Dispatcher) -> JsonRpcResponse {
    let id = req.id.clone();
    match req.method.as_str() {
        "initialize" => JsonRpcResponse::ok(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "intent",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),

        "tools/list" => {
            let tools: Vec<Value> = dispatcher
                .list_actions()
                .iter()
                .map(|a| {
                    let description = if a.locked {
                        format!("[locked] {}", a.description)
                    } else {
                        a.description.clone()
                    };
                    serde_json::json!({
                        "name": a.name,
                        "description": description,
                        "inputSchema": a.schema.to_json_schema()
                    })
                })
                .collect();
            JsonRpcResponse::ok(id, serde_json::json!({ "tools": tools }))
        }

        "tools/call" => {
            let Some(params) = &req.params else {
                return JsonRpcResponse::err(id, -32602, "missing params");
            };
            let Some(name) = params["name"].as_str() else {
                return JsonRpcResponse::err(id, -32602, "missing tool name in params");
            };
            if dispatcher.registry().resolve(name).is_err() {
                return JsonRpcResponse::err(id, -32601, format!("tool not found: {name}"));
            }

            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
            let (text, is_error) = match dispatcher.dispatch(name, args, Some(SOURCE)) {
                Ok(v) => (
                    serde_json::to_string_pretty(&v)
                        .unwrap_or_else(|e| format!("serialization error: {e}")),
                    false,
                ),
                Err(e) => {
                    let body = ErrorBody::from(&e);
                    (
                        serde_json::to_string(&body).unwrap_or_else(|_| e.to_string()),
                        true,
                    )
                }
            };

            let call_result = ToolCallResult {
                content: vec![ToolContent {
                    r#type: "text",
                    text,
                }],
                is_error,
            };
            JsonRpcResponse::ok(
                id,
                serde_json::to_value(&call_result)
                    .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()})),
            )
        }

        "ping" => JsonRpcResponse::ok(id, serde_json::json!({})),

        other => JsonRpcResponse::err(id, -32601, format!("method not found: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use intent_core::Hub;
    use serde_json::json;
    use tempfile::TempDir;

    fn hub(dir: &TempDir) -> Hub {
        Hub::init(dir.path(), "test").unwrap();
        Hub::open(dir.path()).unwrap()
    }

    fn make_req(id: i64, method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(Value::Number(id.into())),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn initialize_returns_capabilities() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let resp = handle_request(&make_req(1, "initialize", Some(json!({}))), hub.dispatcher());
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert!(result["capabilities"]["tools"].is_object());
        assert_eq!(result["serverInfo"]["name"], "intent");
    }

    #[test]
    fn tools_list_exposes_every_action_with_schema() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let resp = handle_request(&make_req(2, "tools/list", None), hub.dispatcher());
        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), hub.dispatcher().list_actions().len());

        let assign = tools.iter().find(|t| t["name"] == "assign_task").unwrap();
        assert_eq!(assign["inputSchema"]["type"], "object");
        assert_eq!(assign["inputSchema"]["required"], json!(["payload"]));
    }

    #[test]
    fn tools_call_dispatches_and_logs_source() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let req = make_req(
            3,
            "tools/call",
            Some(json!({"name": "assign_task", "arguments": {"payload": {"n": 1}}})),
        );
        let resp = handle_request(&req, hub.dispatcher());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("T1"));

        let log = hub.dispatcher().log().tail(1).unwrap();
        assert_eq!(log[0].source.as_deref(), Some("mcp"));
    }

    #[test]
    fn tools_call_schema_violation_sets_is_error() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let req = make_req(
            4,
            "tools/call",
            Some(json!({"name": "task_status", "arguments": {}})),
        );
        let resp = handle_request(&req, hub.dispatcher());
        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        let body: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["kind"], "schema_violation");
    }

    #[test]
    fn tools_call_unknown_tool_returns_error() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let req = make_req(5, "tools/call", Some(json!({"name": "nonexistent"})));
        let resp = handle_request(&req, hub.dispatcher());
        assert!(resp.result.is_none());
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[test]
    fn tools_call_without_params_is_invalid_params() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let resp = handle_request(&make_req(6, "tools/call", None), hub.dispatcher());
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[test]
    fn unknown_method_returns_method_not_found() {
        let dir = TempDir::new().unwrap();
        let hub = hub(&dir);
        let resp = handle_request(&make_req(7, "resources/list", None), hub.dispatcher());
        assert_eq!(resp.error.unwrap().code, -32601);
    }
}
