// Shared test doubles: an in-memory MCP tool server, a scripted model and
// a recording code-hosting platform.
#![allow(dead_code)]

use async_trait::async_trait;
use dewhale::config::ServerDescriptor;
use dewhale::domain::{Issue, IssueComment, IssueRef, Label};
use dewhale::model::{ModelClient, ModelError, ModelHandle, ModelRequest, ModelResponse, ModelRole};
use dewhale::platform::{Platform, PlatformError};
use dewhale::tooling::{ConnectionError, Inbound, Transport, TransportFactory};
use dewhale::types::ToolCall;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

// ============================================================================
// Fake MCP server
// ============================================================================

/// Tool server speaking newline-delimited JSON-RPC over an in-memory pipe.
///
/// Tool behaviour is keyed by name:
/// - `echo` returns its `text` argument
/// - `fail` answers with a JSON-RPC error
/// - `flagged` returns content marked `isError`
/// - `hang` never answers
/// - `summarize` asks the client to sample a message and returns its text
/// - `ping_client` pings the client and returns `pong`
/// - `probe` sends `roots/list` and returns the error code it got back
///
/// A [`FakeServer::silent`] server reads everything and answers nothing.
#[derive(Clone, Default)]
pub struct FakeServer {
    tools: Vec<Value>,
    page_size: Option<usize>,
    silent: bool,
    received: Arc<Mutex<Vec<Value>>>,
}

impl FakeServer {
    pub fn with_tools(names: &[&str]) -> Self {
        Self {
            tools: names
                .iter()
                .map(|name| {
                    json!({
                        "name": name,
                        "description": format!("{name} tool"),
                        "inputSchema": {
                            "type": "object",
                            "properties": {"text": {"type": "string"}}
                        }
                    })
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::default()
        }
    }

    pub fn paged(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Every message the server has read, in order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().expect("received lock").clone()
    }

    pub fn calls(&self) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|m| m["method"] == "tools/call")
            .map(|m| m["params"].clone())
            .collect()
    }

    fn list_page(&self, cursor: Option<&str>) -> Value {
        let start = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
        let size = self.page_size.unwrap_or(self.tools.len().max(1));
        let end = (start + size).min(self.tools.len());
        let mut result = json!({ "tools": self.tools[start..end].to_vec() });
        if end < self.tools.len() {
            result["nextCursor"] = json!(end.to_string());
        }
        result
    }

    async fn serve<R, W>(self, reader: R, mut writer: W)
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        // Requests we sent to the client: our id -> (tools/call id, tool).
        let mut waiting: HashMap<String, (Value, String)> = HashMap::new();
        let mut counter = 0u32;

        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            self.received.lock().expect("received lock").push(message.clone());
            if self.silent {
                continue;
            }

            let id = message.get("id").cloned();
            let method = message.get("method").and_then(Value::as_str).map(str::to_string);
            let reply = match (method.as_deref(), id) {
                (Some("initialize"), Some(id)) => Some(result(id, json!({
                    "protocolVersion": message["params"]["protocolVersion"],
                    "capabilities": {"tools": {}},
                    "serverInfo": {"name": "fake", "version": "0.0.1"}
                }))),
                (Some("tools/list"), Some(id)) => {
                    Some(result(id, self.list_page(message["params"]["cursor"].as_str())))
                }
                (Some("tools/call"), Some(id)) => {
                    let name = message["params"]["name"].as_str().unwrap_or_default().to_string();
                    let args = message["params"]["arguments"].clone();
                    match name.as_str() {
                        "echo" => Some(result(id, text_content(args["text"].as_str().unwrap_or_default()))),
                        "fail" => Some(json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32000, "message": "tool exploded", "data": {"tool": "fail"}}
                        })),
                        "flagged" => Some(result(id, json!({
                            "content": [{"type": "text", "text": "bad input"}],
                            "isError": true
                        }))),
                        "hang" => None,
                        "summarize" | "ping_client" | "probe" => {
                            counter += 1;
                            let outbound_id = format!("srv-{counter}");
                            waiting.insert(outbound_id.clone(), (id, name.clone()));
                            Some(match name.as_str() {
                                "summarize" => json!({
                                    "jsonrpc": "2.0",
                                    "id": outbound_id,
                                    "method": "sampling/createMessage",
                                    "params": {
                                        "messages": [{
                                            "role": "user",
                                            "content": {"type": "text", "text": args["text"]}
                                        }],
                                        "systemPrompt": "Summarize.",
                                        "maxTokens": 64,
                                        "modelPreferences": {"costPriority": 1.0, "speedPriority": 0.2}
                                    }
                                }),
                                "ping_client" => json!({
                                    "jsonrpc": "2.0",
                                    "id": outbound_id,
                                    "method": "ping"
                                }),
                                _ => json!({
                                    "jsonrpc": "2.0",
                                    "id": outbound_id,
                                    "method": "roots/list",
                                    "params": {}
                                }),
                            })
                        }
                        other => Some(json!({
                            "jsonrpc": "2.0",
                            "id": id,
                            "error": {"code": -32602, "message": format!("unknown tool {other}")}
                        })),
                    }
                }
                (Some(_), Some(id)) => Some(json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": {"code": -32601, "message": "method not found"}
                })),
                (Some(_), None) => None,
                (None, Some(reply_id)) => {
                    let key = reply_id.as_str().unwrap_or_default().to_string();
                    waiting.remove(&key).map(|(call_id, tool)| {
                        let text = match tool.as_str() {
                            "summarize" => message["result"]["content"]["text"]
                                .as_str()
                                .map(|text| format!("{text} ({})", message["result"]["model"].as_str().unwrap_or("?")))
                                .unwrap_or_else(|| "sampling failed".to_string()),
                            "ping_client" if message["result"] == json!({}) => "pong".to_string(),
                            "ping_client" => "no pong".to_string(),
                            _ => message["error"]["code"].to_string(),
                        };
                        result(call_id, text_content(&text))
                    })
                }
                (None, None) => None,
            };

            if let Some(reply) = reply {
                let mut line = reply.to_string();
                line.push('\n');
                if writer.write_all(line.as_bytes()).await.is_err() || writer.flush().await.is_err() {
                    break;
                }
            }
        }
    }
}

fn result(id: Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

fn text_content(text: &str) -> Value {
    json!({"content": [{"type": "text", "text": text}]})
}

/// Opens an in-memory [`FakeServer`] for each known descriptor name.
#[derive(Clone, Default)]
pub struct FakeFactory {
    servers: HashMap<String, FakeServer>,
}

impl FakeFactory {
    pub fn with(mut self, name: &str, server: FakeServer) -> Self {
        self.servers.insert(name.to_string(), server);
        self
    }
}

#[async_trait]
impl TransportFactory for FakeFactory {
    async fn open(&self, descriptor: &ServerDescriptor) -> Result<(Transport, Inbound), ConnectionError> {
        let server = self
            .servers
            .get(&descriptor.name)
            .cloned()
            .ok_or_else(|| ConnectionError::InvalidDescriptor {
                server: descriptor.name.clone(),
                reason: "no fake server registered".into(),
            })?;
        let (client_end, server_end) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_end);
        let (server_read, server_write) = tokio::io::split(server_end);
        tokio::spawn(server.serve(server_read, server_write));
        Ok(Transport::pipe(descriptor.name.clone(), client_read, client_write))
    }
}

pub fn descriptor(name: &str) -> ServerDescriptor {
    ServerDescriptor::process(name, "unused", Vec::new())
}

// ============================================================================
// Scripted model
// ============================================================================

#[derive(Clone)]
pub struct ScriptedModel {
    id: String,
    responses: Arc<Mutex<Vec<ModelResponse>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new(id: &str, responses: Vec<ModelResponse>) -> Self {
        Self {
            id: id.to_string(),
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A model that answers every request with the same text.
    pub fn constant(id: &str, text: &str) -> Self {
        Self::new(id, vec![reply(text)])
    }

    pub fn handle(&self, role: ModelRole) -> ModelHandle {
        ModelHandle::new(role, Arc::new(self.clone()))
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().expect("requests lock").push(request);
        let mut responses = self.responses.lock().expect("responses lock");
        match responses.len() {
            0 => Err(ModelError::invalid_response("scripted", "script exhausted")),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.remove(0)),
        }
    }
}

pub fn reply(text: &str) -> ModelResponse {
    ModelResponse {
        text: text.to_string(),
        tool_calls: Vec::new(),
    }
}

pub fn tool_request(id: &str, name: &str, arguments: Value) -> ModelResponse {
    ModelResponse {
        text: String::new(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
    }
}

// ============================================================================
// Recording platform
// ============================================================================

#[derive(Default)]
pub struct MemoryPlatform {
    issues: Mutex<Vec<Issue>>,
    comments: Mutex<Vec<(IssueRef, String)>>,
    fail_comments: bool,
}

impl MemoryPlatform {
    pub fn with_issues(issues: Vec<Issue>) -> Self {
        Self {
            issues: Mutex::new(issues),
            ..Self::default()
        }
    }

    /// Every comment post is answered with a 502.
    pub fn failing_comments(mut self) -> Self {
        self.fail_comments = true;
        self
    }

    pub fn comments(&self) -> Vec<(IssueRef, String)> {
        self.comments.lock().expect("comments lock").clone()
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn get_issue(&self, reference: &IssueRef) -> Result<Issue, PlatformError> {
        self.issues
            .lock()
            .expect("issues lock")
            .iter()
            .find(|issue| issue.reference() == *reference)
            .cloned()
            .ok_or(PlatformError::Status {
                status: 404,
                body: "Not Found".into(),
            })
    }

    async fn list_issues(&self, owner: &str, repo: &str, labels: &[String]) -> Result<Vec<Issue>, PlatformError> {
        Ok(self
            .issues
            .lock()
            .expect("issues lock")
            .iter()
            .filter(|issue| issue.owner == owner && issue.repo == repo)
            .filter(|issue| labels.iter().all(|label| issue.has_label(label)))
            .cloned()
            .collect())
    }

    async fn create_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), PlatformError> {
        if self.fail_comments {
            return Err(PlatformError::Status {
                status: 502,
                body: "Bad Gateway".into(),
            });
        }
        self.comments
            .lock()
            .expect("comments lock")
            .push((issue.clone(), body.to_string()));
        Ok(())
    }

    fn max_comment_len(&self) -> usize {
        4096
    }
}

pub fn issue(id: u64, state: &str, labels: &[&str], comments: &[&str]) -> Issue {
    Issue {
        owner: "acme".into(),
        repo: "rocket".into(),
        id,
        title: format!("Issue {id}"),
        content: "Something is broken".into(),
        state: state.into(),
        labels: labels.iter().map(|name| Label { name: name.to_string() }).collect(),
        comments: comments
            .iter()
            .map(|content| IssueComment {
                author: "someone".into(),
                content: content.to_string(),
            })
            .collect(),
    }
}
