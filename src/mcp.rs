use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::config::SettingsHandle;

// Sent to the client via the MCP `instructions` field during initialization.
const SERVER_INSTRUCTIONS: &str = "\
rwgrep — find every use of an identifier across a workspace, split into reads and writes.\n\
\n\
rwgrep_search: pass the exact token (e.g. a variable or field name) and optionally the roots to \
search. Each hit is tagged [write] when the token is followed by an assignment or mutation \
operator (=, +=, ++, ...) or a mutating method (.push, .insert, ->erase, ...), otherwise [read]. \
Lines that start with a comment are ignored. Use format \"json\" for structured output with \
0-based line numbers and byte offsets.\n\
\n\
rwgrep_reload_config: re-read rwgrep.toml after editing patterns or exclusions.";

/// Notification a client sends after editing the config file.
const CONFIG_CHANGED: &str = "rwgrep/configChanged";

/// MCP server over stdio. Requests are handled one at a time; each search
/// takes the configuration snapshot current when it starts.
pub fn run(settings: &SettingsHandle) -> io::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let req: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                write_error(&mut stdout, None, -32700, &format!("parse error: {e}"))?;
                continue;
            }
        };

        // Notifications have no id — nothing to answer
        if req.id.is_none() {
            if req.method == CONFIG_CHANGED {
                settings.reload();
            }
            continue;
        }

        let response = handle_request(&req, settings);
        serde_json::to_writer(&mut stdout, &response)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }

    Ok(())
}

#[derive(Deserialize)]
struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

fn handle_request(req: &JsonRpcRequest, settings: &SettingsHandle) -> JsonRpcResponse {
    match req.method.as_str() {
        "initialize" => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "rwgrep",
                    "version": env!("CARGO_PKG_VERSION")
                },
                "instructions": SERVER_INSTRUCTIONS
            })),
            error: None,
        },

        "tools/list" => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(serde_json::json!({
                "tools": tool_definitions()
            })),
            error: None,
        },

        "tools/call" => handle_tool_call(req, settings),

        "ping" => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(serde_json::json!({})),
            error: None,
        },

        _ => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("method not found: {}", req.method),
            }),
        },
    }
}

// ---------------------------------------------------------------------------
// Tool dispatch
// ---------------------------------------------------------------------------

pub(crate) fn dispatch_tool(
    tool: &str,
    args: &Value,
    settings: &SettingsHandle,
) -> Result<String, String> {
    match tool {
        "rwgrep_search" => tool_search(args, settings),
        "rwgrep_reload_config" => {
            let config = settings.reload();
            Ok(format!(
                "Configuration reloaded: {} operators, {} methods, {} exclusions.",
                config.patterns.common.operators.len(),
                config.patterns.common.methods.len(),
                config.patterns.common.exclude_operators.len()
            ))
        }
        _ => Err(format!("unknown tool: {tool}")),
    }
}

fn tool_search(args: &Value, settings: &SettingsHandle) -> Result<String, String> {
    let token = args
        .get("token")
        .and_then(|v| v.as_str())
        .ok_or("missing required parameter: token")?;
    let roots = resolve_roots(args)?;

    let mut config = (*settings.snapshot()).clone();
    if let Some(v) = args.get("caseSensitive").and_then(Value::as_bool) {
        config.case_sensitive = v;
    }
    if let Some(v) = args.get("matchWholeWord").and_then(Value::as_bool) {
        config.match_whole_word = v;
    }

    let report = crate::search(token, &roots, Arc::new(config), &CancelToken::new())
        .map_err(|e| e.to_string())?;

    match args.get("format").and_then(|v| v.as_str()).unwrap_or("text") {
        "json" => Ok(crate::format::render_json(&report).to_string()),
        "text" => Ok(crate::format::render(&report, None)),
        other => Err(format!("unknown format: {other}. Use: text, json")),
    }
}

/// `roots` may be a string or an array of strings; defaults to the working directory.
fn resolve_roots(args: &Value) -> Result<Vec<PathBuf>, String> {
    let raw: Vec<PathBuf> = match args.get("roots") {
        None | Some(Value::Null) => vec![PathBuf::from(".")],
        Some(Value::String(s)) => vec![PathBuf::from(s)],
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(PathBuf::from))
            .collect::<Option<_>>()
            .ok_or("roots must be a string or an array of strings")?,
        Some(_) => return Err("roots must be a string or an array of strings".into()),
    };
    if raw.is_empty() {
        return Err("roots must not be empty".into());
    }
    Ok(raw)
}

// ---------------------------------------------------------------------------
// MCP tool call handler
// ---------------------------------------------------------------------------

fn handle_tool_call(req: &JsonRpcRequest, settings: &SettingsHandle) -> JsonRpcResponse {
    let params = &req.params;
    let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let args = params.get("arguments").unwrap_or(&Value::Null);

    let result = dispatch_tool(tool_name, args, settings);

    match result {
        Ok(output) => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": output
                }]
            })),
            error: None,
        },
        Err(e) => JsonRpcResponse {
            jsonrpc: "2.0",
            id: req.id.clone(),
            result: Some(serde_json::json!({
                "content": [{
                    "type": "text",
                    "text": e
                }],
                "isError": true
            })),
            error: None,
        },
    }
}

// ---------------------------------------------------------------------------
// Tool definitions
// ---------------------------------------------------------------------------

fn tool_definitions() -> Vec<Value> {
    vec![
        serde_json::json!({
            "name": "rwgrep_search",
            "description": "Find every occurrence of a token across the workspace and classify each as a read or a write, based on the syntax right after it.",
            "inputSchema": {
                "type": "object",
                "required": ["token"],
                "properties": {
                    "token": {
                        "type": "string",
                        "description": "Literal text to find. Never interpreted as a regex."
                    },
                    "roots": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Directories to search. Default: current directory."
                    },
                    "caseSensitive": {
                        "type": "boolean",
                        "description": "Override the configured case sensitivity."
                    },
                    "matchWholeWord": {
                        "type": "boolean",
                        "description": "Override the configured whole-word matching."
                    },
                    "format": {
                        "type": "string",
                        "enum": ["text", "json"],
                        "default": "text"
                    }
                }
            }
        }),
        serde_json::json!({
            "name": "rwgrep_reload_config",
            "description": "Re-read the configuration file. Later searches use the new patterns and exclusions.",
            "inputSchema": {
                "type": "object",
                "properties": {}
            }
        }),
    ]
}

fn write_error(w: &mut impl Write, id: Option<Value>, code: i32, msg: &str) -> io::Result<()> {
    let resp = JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: msg.into(),
        }),
    };
    serde_json::to_writer(&mut *w, &resp)?;
    w.write_all(b"\n")?;
    w.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            _jsonrpc: "2.0".into(),
            id: Some(Value::from(1)),
            method: method.into(),
            params,
        }
    }

    #[test]
    fn lists_both_tools() {
        let settings = SettingsHandle::from_config(Config::default());
        let resp = handle_request(&request("tools/list", Value::Null), &settings);
        let tools = resp.result.unwrap()["tools"].clone();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(names, vec!["rwgrep_search", "rwgrep_reload_config"]);
    }

    #[test]
    fn unknown_method_is_an_error() {
        let settings = SettingsHandle::from_config(Config::default());
        let resp = handle_request(&request("nope", Value::Null), &settings);
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[test]
    fn search_requires_token() {
        let settings = SettingsHandle::from_config(Config::default());
        let err = dispatch_tool("rwgrep_search", &serde_json::json!({}), &settings).unwrap_err();
        assert!(err.contains("token"), "{err}");
    }

    #[test]
    fn blank_token_returns_empty_result() {
        let settings = SettingsHandle::from_config(Config::default());
        let out = dispatch_tool(
            "rwgrep_search",
            &serde_json::json!({ "token": "  ", "roots": ["."] }),
            &settings,
        )
        .unwrap();
        assert!(out.contains("no matches"), "{out}");
    }

    #[test]
    fn roots_shapes() {
        assert_eq!(
            resolve_roots(&serde_json::json!({})).unwrap(),
            vec![PathBuf::from(".")]
        );
        assert_eq!(
            resolve_roots(&serde_json::json!({ "roots": "src" })).unwrap(),
            vec![PathBuf::from("src")]
        );
        assert!(resolve_roots(&serde_json::json!({ "roots": [1] })).is_err());
        assert!(resolve_roots(&serde_json::json!({ "roots": [] })).is_err());
    }
}
