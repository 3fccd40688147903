use crate::core::analytics::ConversionPolicy;
use crate::mcp::protocol::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND,
    PARSE_ERROR, PROTOCOL_VERSION, Request, Response,
};
use crate::mcp::tools::{self, ToolError};
use crate::service::RateService;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Dispatches JSON-RPC requests to the rate tools.
pub struct McpServer {
    service: Arc<RateService>,
    policy: ConversionPolicy,
}

impl McpServer {
    pub fn new(service: Arc<RateService>, policy: ConversionPolicy) -> Self {
        Self { service, policy }
    }

    /// Handles one line of input. Returns `None` when no reply is due.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(Response::failure(
                Value::Null,
                PARSE_ERROR,
                format!("Parse error: {e}"),
            )),
            Ok(value) => match serde_json::from_value::<Request>(value) {
                Ok(request) => self.handle(request).await,
                Err(e) => Some(Response::failure(
                    Value::Null,
                    INVALID_REQUEST,
                    format!("Invalid request: {e}"),
                )),
            },
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Failed to serialize response: {}", e);
                None
            }
        }
    }

    pub async fn handle(&self, request: Request) -> Option<Response> {
        debug!(method = %request.method, "Handling request");

        if request.jsonrpc.as_deref().is_some_and(|v| v != JSONRPC_VERSION) {
            return request.id.map(|id| {
                Response::failure(id, INVALID_REQUEST, "Unsupported jsonrpc version")
            });
        }

        let Some(id) = request.id.clone() else {
            if request.method != "notifications/initialized" {
                debug!(method = %request.method, "Ignoring notification");
            }
            return None;
        };

        let params = request.params.unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => Response::success(id, self.initialize(&params)),
            "ping" => Response::success(id, json!({})),
            "tools/list" => Response::success(id, json!({ "tools": tools::tool_definitions() })),
            "tools/call" => self.call(id, params).await,
            other => Response::failure(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };
        Some(response)
    }

    fn initialize(&self, params: &Value) -> Value {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        if let Some(client) = params.get("clientInfo") {
            info!(client = %client, "Client connected");
        }
        json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    async fn call(&self, id: Value, params: Value) -> Response {
        let params: CallParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => return Response::failure(id, INVALID_PARAMS, format!("Invalid params: {e}")),
        };

        match tools::call_tool(&self.service, self.policy, &params.name, params.arguments).await {
            Ok(payload) => Response::success(id, tool_result(&payload, false)),
            Err(ToolError::Rate(e)) => {
                warn!(tool = %params.name, code = e.code(), "Tool failed: {}", e);
                let payload = json!({"error": true, "code": e.code(), "message": e.to_string()});
                Response::success(id, tool_result(&payload, true))
            }
            Err(e @ (ToolError::InvalidParams(_) | ToolError::UnknownTool(_))) => {
                Response::failure(id, INVALID_PARAMS, e.to_string())
            }
            Err(e @ ToolError::Internal(_)) => Response::failure(id, INTERNAL_ERROR, e.to_string()),
        }
    }
}

fn tool_result(payload: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    json!({
        "content": [{"type": "text", "text": text}],
        "isError": is_error,
    })
}
