use crate::infrastructure::rpc::RpcError;
use serde_json::{Map, Value, json};
use std::time::Duration;
use thiserror::Error;

/// Failure of one exchange with a connected tool server.
#[derive(Debug, Error)]
pub enum ToolInvokeError {
    #[error("MCP server '{server}' is not connected")]
    NotConnected { server: String },
    #[error("MCP server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("MCP server '{server}' message could not be encoded: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("MCP server '{server}' returned JSON-RPC error {}: {}", error.code, error.message)]
    Rpc { server: String, error: RpcError },
    #[error("MCP server '{server}' returned an unexpected payload: {reason}")]
    InvalidPayload { server: String, reason: String },
    #[error("'{request}' on MCP server '{server}' timed out after {}s", timeout.as_secs())]
    Timeout {
        server: String,
        request: String,
        timeout: Duration,
    },
    #[error("MCP server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("MCP server '{server}' request cancelled")]
    Cancelled { server: String },
    #[error("tool '{tool}' is not provided by any connected MCP server")]
    UnknownTool { tool: String },
}

impl ToolInvokeError {
    /// Stable error kind used in tool error payloads.
    pub fn name(&self) -> &'static str {
        match self {
            ToolInvokeError::NotConnected { .. } => "NotConnectedError",
            ToolInvokeError::Transport { .. } => "TransportError",
            ToolInvokeError::InvalidJson { .. } => "InvalidJsonError",
            ToolInvokeError::Rpc { .. } => "McpError",
            ToolInvokeError::InvalidPayload { .. } => "InvalidPayloadError",
            ToolInvokeError::Timeout { .. } => "TimeoutError",
            ToolInvokeError::Terminated { .. } => "TerminatedError",
            ToolInvokeError::Cancelled { .. } => "CancelledError",
            ToolInvokeError::UnknownTool { .. } => "UnknownToolError",
        }
    }

    /// `{"error": {"message", "name", ...}}`, with the provider's `code` and
    /// `data` when the server itself reported the failure.
    pub fn to_payload(&self) -> Value {
        let mut error = Map::new();
        error.insert("message".into(), Value::String(self.to_string()));
        error.insert("name".into(), Value::String(self.name().to_string()));
        match self {
            ToolInvokeError::Rpc { error: rpc, .. } => {
                error.insert("code".into(), json!(rpc.code));
                if let Some(data) = &rpc.data {
                    error.insert("data".into(), data.clone());
                }
            }
            ToolInvokeError::Timeout { timeout, .. } => {
                error.insert("timeoutMs".into(), json!(timeout.as_millis() as u64));
            }
            _ => {}
        }
        json!({ "error": error })
    }
}

/// Failure to bring a tool server up. Fatal for the character being started.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("unsupported transport type '{kind}' for MCP server '{server}'")]
    UnsupportedTransport { server: String, kind: String },
    #[error("MCP server '{server}' is misconfigured: {reason}")]
    InvalidDescriptor { server: String, reason: String },
    #[error("failed to spawn MCP server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open event stream for MCP server '{server}': {message}")]
    Stream { server: String, message: String },
    #[error("initialization handshake with MCP server '{server}' failed: {source}")]
    Handshake {
        server: String,
        #[source]
        source: ToolInvokeError,
    },
    #[error("listing tools of MCP server '{server}' failed: {source}")]
    ListTools {
        server: String,
        #[source]
        source: ToolInvokeError,
    },
}
