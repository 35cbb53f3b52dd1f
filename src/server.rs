#![deny(warnings)]

// JSON-RPC dispatch for the MCP lifecycle and tool calls

use crate::config::Config;
use crate::error::Result;
use crate::tools::ToolRegistry;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};

/// Protocol revisions the server accepts in `initialize`
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-06-18", "2025-11-25"];

/// JSON-RPC error codes
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const SERVER_ERROR: i32 = -32000;
}

#[derive(Debug)]
struct Failure {
    code: i32,
    message: String,
}

impl Failure {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn not_initialized() -> Self {
        Self::new(
            codes::SERVER_ERROR,
            "Server not initialized. Call 'initialize' first.",
        )
    }
}

impl From<crate::error::FopsError> for Failure {
    fn from(e: crate::error::FopsError) -> Self {
        Self::new(codes::SERVER_ERROR, e.to_string())
    }
}

pub fn error_response(id: Option<Value>, code: i32, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

/// One MCP session worth of state around a [`ToolRegistry`]
pub struct McpServer {
    registry: ToolRegistry,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            registry: ToolRegistry::new(config)?,
            initialized: AtomicBool::new(false),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw frame. Unparseable input yields a parse-error reply;
    /// notifications yield nothing.
    pub async fn handle_text(&self, text: &str) -> Option<String> {
        let reply = match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle_message(message).await?,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable JSON-RPC frame");
                error_response(None, codes::PARSE_ERROR, "Parse error")
            }
        };
        match serde_json::to_string(&reply) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize reply");
                None
            }
        }
    }

    /// Handle one decoded JSON-RPC message
    pub async fn handle_message(&self, message: Value) -> Option<Value> {
        let id = message.get("id").cloned();

        if let Some(version) = message.get("jsonrpc").and_then(Value::as_str) {
            if version != "2.0" {
                let text = format!("Invalid JSON-RPC version: {}", version);
                return Some(error_response(id, codes::INVALID_REQUEST, &text));
            }
        }

        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let outcome = self.dispatch(method, &params).await;

        // Notifications carry no id and get no reply, even on failure
        let id = id?;
        Some(match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Err(failure) => {
                tracing::warn!(method, code = failure.code, error = %failure.message, "request failed");
                error_response(Some(id), failure.code, &failure.message)
            }
        })
    }

    async fn dispatch(&self, method: &str, params: &Value) -> std::result::Result<Value, Failure> {
        match method {
            "initialize" => self.initialize(params),
            "initialized" | "notifications/initialized" => {
                self.initialized.store(true, Ordering::Release);
                Ok(Value::Null)
            }
            "tools/list" => {
                self.require_initialized()?;
                Ok(json!({ "tools": self.registry.list_tools() }))
            }
            "tools/call" => {
                self.require_initialized()?;
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Failure::new(codes::INVALID_PARAMS, "Invalid params: Missing tool name"))?;
                let arguments = params.get("arguments").unwrap_or(&Value::Null);
                self.registry
                    .execute_tool(name, arguments)
                    .await
                    .map_err(Failure::from)
            }
            "shutdown" => {
                self.require_initialized()?;
                self.initialized.store(false, Ordering::Release);
                Ok(Value::Null)
            }
            "" => Err(Failure::new(codes::METHOD_NOT_FOUND, "Method not found: (missing)")),
            other => Err(Failure::new(
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {:?}", other),
            )),
        }
    }

    fn require_initialized(&self) -> std::result::Result<(), Failure> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Failure::not_initialized())
        }
    }

    fn initialize(&self, params: &Value) -> std::result::Result<Value, Failure> {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0]);
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&version) {
            return Err(Failure::new(
                codes::SERVER_ERROR,
                format!("Unsupported protocol version: {}", version),
            ));
        }

        tracing::info!(protocol_version = version, root = %self.registry.sandbox().root().display(), "initialized");
        Ok(json!({
            "protocolVersion": version,
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": { "tools": { "listChanged": false } },
            "tools": self.registry.list_tools(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server() -> (TempDir, McpServer) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        (dir, McpServer::new(config).unwrap())
    }

    fn request(id: u64, method: &str, params: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
    }

    #[tokio::test]
    async fn test_initialize_lifecycle() {
        let (_dir, server) = server();
        assert!(!server.is_initialized());

        let reply = server
            .handle_message(request(1, "initialize", json!({"protocolVersion": "2025-06-18"})))
            .await
            .unwrap();
        assert_eq!(reply["result"]["serverInfo"]["name"], "fops-mcp");
        assert_eq!(reply["result"]["tools"].as_array().unwrap().len(), 10);

        let note = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
        assert!(server.handle_message(note).await.is_none());
        assert!(server.is_initialized());

        server.handle_message(request(2, "shutdown", json!({}))).await.unwrap();
        assert!(!server.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_rejects_unknown_version() {
        let (_dir, server) = server();
        let reply = server
            .handle_message(request(1, "initialize", json!({"protocolVersion": "1999-01-01"})))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], codes::SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_tools_gated_until_initialized() {
        let (_dir, server) = server();
        let reply = server
            .handle_message(request(1, "tools/list", json!({})))
            .await
            .unwrap();
        assert!(reply["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not initialized"));
    }

    #[tokio::test]
    async fn test_tool_call_and_missing_name() {
        let (_dir, server) = server();
        server.handle_message(json!({"jsonrpc": "2.0", "method": "initialized"})).await;

        let reply = server
            .handle_message(request(
                1,
                "tools/call",
                json!({"name": "fops_unitsize", "arguments": {"value": 2048}}),
            ))
            .await
            .unwrap();
        assert!(reply["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("2 KB"));

        let reply = server
            .handle_message(request(2, "tools/call", json!({})))
            .await
            .unwrap();
        assert_eq!(reply["error"]["code"], codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_raw_frames() {
        let (_dir, server) = server();
        let reply = server.handle_text("{oops").await.unwrap();
        assert!(reply.contains("-32700"));

        let reply = server
            .handle_text(r#"{"jsonrpc":"1.0","id":3,"method":"initialize"}"#)
            .await
            .unwrap();
        assert!(reply.contains("-32600"));

        let reply = server
            .handle_text(r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert!(reply.contains("Method not found"));
    }
}
