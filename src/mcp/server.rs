use std::io::{self, BufRead, Write};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::mcp::handlers::{self, HandlerContext};
use crate::mcp::protocol::*;

/// Run the MCP server event loop over stdio
pub fn run_server(ctx: HandlerContext) {
    let stdin = io::stdin();
    let stdout = io::stdout();
    info!(cache_dir = %ctx.cache.root().display(), "MCP server ready, waiting for JSON-RPC requests on stdin");
    serve(&ctx, stdin.lock(), stdout.lock());
    info!("stdin closed, shutting down");
}

/// One JSON-RPC message per line in, one response per line out.
/// Notifications get no response.
pub(crate) fn serve(ctx: &HandlerContext, reader: impl BufRead, mut writer: impl Write) {
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "Error reading stdin");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        debug!(request = %line, "Incoming JSON-RPC");

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(request) => match request.id {
                Some(id) => handle_request(ctx, &request.method, &request.params, id),
                None => {
                    debug!(method = %request.method, "Received notification");
                    continue;
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to parse JSON-RPC request");
                to_json(&JsonRpcErrorResponse::new(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ))
            }
        };

        debug!(response = %response, "Outgoing JSON-RPC");
        if writeln!(writer, "{}", response).and_then(|_| writer.flush()).is_err() {
            error!("stdout closed, shutting down");
            break;
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        error!(error = %e, "Failed to serialize response");
        Value::Null
    })
}

fn success<T: Serialize>(id: Value, result: &T) -> Value {
    to_json(&JsonRpcResponse::new(id, to_json(result)))
}

fn handle_request(ctx: &HandlerContext, method: &str, params: &Option<Value>, id: Value) -> Value {
    match method {
        "initialize" => success(id, &InitializeResult::new()),
        "tools/list" => success(
            id,
            &ToolsListResult {
                tools: handlers::tool_definitions(),
            },
        ),
        "tools/call" => {
            let params = match params {
                Some(p) => p,
                None => return success(id, &ToolCallResult::error("Missing params".to_string())),
            };

            let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or(Value::Object(serde_json::Map::new()));

            let result = handlers::dispatch_tool(ctx, tool_name, &arguments);
            success(id, &result)
        }
        "ping" => success(id, &json!({})),
        _ => to_json(&JsonRpcErrorResponse::new(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}
