use super::error::{ConnectionError, ToolInvokeError};
use super::transport::{Inbound, Transport, TransportFactory};
use crate::config::ServerDescriptor;
use crate::constants::{CLIENT_NAME, HANDSHAKE_TIMEOUT, INBOUND_REQUEST_LIMIT, PROTOCOL_VERSION};
use crate::infrastructure::rpc::types::id_key;
use crate::infrastructure::rpc::{InboundMessage, RpcError, RpcNotification, RpcRequest, RpcResponse};
use crate::types::ToolSpec;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Answers a request the server sends to us.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, params: Value) -> Result<Value, RpcError>;
}

/// Receives a notification the server sends to us.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Value);
}

/// Inbound handlers of one connection, keyed by method.
#[derive(Clone, Default)]
pub struct InboundHandlers {
    requests: HashMap<String, Arc<dyn RequestHandler>>,
    notifications: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl InboundHandlers {
    pub fn on_request(mut self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) -> Self {
        self.requests.insert(method.into(), handler);
        self
    }

    pub fn on_notification(
        mut self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        self.notifications.insert(method.into(), handler);
        self
    }
}

/// Forwards `notifications/message` log entries to `tracing`.
pub struct LoggingHandler {
    server: String,
}

impl LoggingHandler {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
        }
    }
}

#[async_trait]
impl NotificationHandler for LoggingHandler {
    async fn handle(&self, params: Value) {
        let level = params.get("level").and_then(Value::as_str).unwrap_or("info");
        let logger = params.get("logger").and_then(Value::as_str).unwrap_or_default();
        let data = params.get("data").cloned().unwrap_or(Value::Null);
        match level {
            "debug" => debug!(server = %self.server, logger, %data, "MCP server log"),
            "info" | "notice" => info!(server = %self.server, logger, %data, "MCP server log"),
            _ => warn!(server = %self.server, level, logger, %data, "MCP server log"),
        }
    }
}

/// Outcome of a tool invocation: the provider's `content` array, or an
/// `{"error": ...}` payload when the call failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallResult {
    pub output: Value,
    /// Set for transport and protocol failures and for results the tool
    /// itself flagged with `isError`.
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn from_error(err: &ToolInvokeError) -> Self {
        Self {
            output: err.to_payload(),
            is_error: true,
        }
    }

    /// Text handed back to the model.
    pub fn text(&self) -> String {
        self.output.to_string()
    }
}

/// A live, initialized session with one tool server.
#[derive(Clone)]
pub struct ToolServerConnection {
    inner: Arc<ConnectionInner>,
}

type PendingMap = HashMap<String, oneshot::Sender<Result<Value, ToolInvokeError>>>;

struct ConnectionInner {
    server: String,
    transport: AsyncMutex<Option<Transport>>,
    pending: AsyncMutex<PendingMap>,
    id_counter: AtomicU64,
    connected: AtomicBool,
    handlers: InboundHandlers,
    inbound_limit: Arc<Semaphore>,
    dispatcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ToolServerConnection {
    /// Open the transport, perform the `initialize` handshake and start
    /// serving inbound messages with `handlers`.
    pub async fn connect(
        descriptor: &ServerDescriptor,
        factory: &dyn TransportFactory,
        handlers: InboundHandlers,
    ) -> Result<Self, ConnectionError> {
        let (transport, inbound) = factory.open(descriptor).await?;
        let connection = Self::attach(descriptor.name.clone(), transport, inbound, handlers);

        if let Err(source) = connection.inner.initialize().await {
            warn!(server = %descriptor.name, %source, "MCP handshake failed");
            if let Err(err) = connection.close().await {
                debug!(server = %descriptor.name, %err, "failed to release transport after handshake failure");
            }
            return Err(ConnectionError::Handshake {
                server: descriptor.name.clone(),
                source,
            });
        }
        info!(server = %descriptor.name, "MCP server connected");
        Ok(connection)
    }

    fn attach(
        server: String,
        transport: Transport,
        inbound: Inbound,
        handlers: InboundHandlers,
    ) -> Self {
        let inner = Arc::new(ConnectionInner {
            server,
            transport: AsyncMutex::new(Some(transport)),
            pending: AsyncMutex::new(HashMap::new()),
            id_counter: AtomicU64::new(1),
            connected: AtomicBool::new(true),
            handlers,
            inbound_limit: Arc::new(Semaphore::new(INBOUND_REQUEST_LIMIT)),
            dispatcher: std::sync::Mutex::new(None),
        });
        let dispatcher = tokio::spawn(Arc::clone(&inner).dispatch_loop(inbound));
        if let Ok(mut slot) = inner.dispatcher.lock() {
            *slot = Some(dispatcher);
        }
        Self { inner }
    }

    pub fn server(&self) -> &str {
        &self.inner.server
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Fetch the server's tools, following pagination. Never cached.
    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolInvokeError> {
        self.inner.ensure_connected()?;
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({ "cursor": cursor }),
                None => json!({}),
            };
            let result = self.inner.send_request("tools/list", params, None).await?;
            let page = result
                .get("tools")
                .and_then(Value::as_array)
                .ok_or_else(|| ToolInvokeError::InvalidPayload {
                    server: self.inner.server.clone(),
                    reason: "tools/list result has no tools array".to_string(),
                })?;
            tools.extend(page.iter().filter_map(parse_tool));
            cursor = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|next| !next.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        debug!(server = %self.inner.server, count = tools.len(), "Listed tools");
        Ok(tools)
    }

    /// Invoke a tool. Failures of any kind come back as an error payload
    /// instead of an `Err`.
    pub async fn call_tool(&self, name: &str, arguments: Value, timeout: Duration) -> ToolCallResult {
        match self.try_call_tool(name, arguments, timeout).await {
            Ok(result) => result,
            Err(err) => {
                warn!(server = %self.inner.server, tool = name, %err, "Tool call failed");
                ToolCallResult::from_error(&err)
            }
        }
    }

    async fn try_call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<ToolCallResult, ToolInvokeError> {
        self.inner.ensure_connected()?;
        let params = json!({
            "name": name,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        let result = self
            .inner
            .send_request("tools/call", params, Some((name, timeout)))
            .await?;
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let output = result
            .get("content")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        Ok(ToolCallResult { output, is_error })
    }

    /// Shut the session down. Safe to call more than once; pending requests
    /// are cancelled and background tasks stopped in every case.
    pub async fn close(&self) -> Result<(), ToolInvokeError> {
        let was_connected = self.inner.connected.swap(false, Ordering::SeqCst);
        let transport = self.inner.transport.lock().await.take();
        if let Ok(mut slot) = self.inner.dispatcher.lock() {
            if let Some(dispatcher) = slot.take() {
                dispatcher.abort();
            }
        }
        self.inner.fail_all_pending(|server| ToolInvokeError::Cancelled { server }).await;

        match transport {
            Some(transport) => {
                let result = transport.close().await;
                if was_connected {
                    info!(server = %self.inner.server, "MCP server disconnected");
                }
                result
            }
            None => Ok(()),
        }
    }
}

impl ConnectionInner {
    fn ensure_connected(&self) -> Result<(), ToolInvokeError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ToolInvokeError::NotConnected {
                server: self.server.clone(),
            })
        }
    }

    async fn initialize(&self) -> Result<(), ToolInvokeError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": { "sampling": {} }
        });
        let result = self
            .send_request("initialize", params, Some(("initialize", HANDSHAKE_TIMEOUT)))
            .await?;
        debug!(
            server = %self.server,
            protocol = result.get("protocolVersion").and_then(serde_json::Value::as_str).unwrap_or_default(),
            "MCP server initialized"
        );
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    async fn dispatch_loop(self: Arc<Self>, mut inbound: Inbound) {
        while let Some(value) = inbound.recv().await {
            match InboundMessage::classify(value) {
                Some(InboundMessage::Response { id, outcome }) => self.handle_response(id, outcome).await,
                Some(InboundMessage::Request { id, method, params }) => {
                    self.handle_server_request(id, method, params)
                }
                Some(InboundMessage::Notification { method, params }) => {
                    self.handle_notification(method, params).await
                }
                None => debug!(server = %self.server, "ignoring unrecognised message"),
            }
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            warn!(server = %self.server, "MCP server closed the connection");
        }
        self.fail_all_pending(|server| ToolInvokeError::Terminated { server }).await;
    }

    async fn handle_response(&self, id: Value, outcome: Result<Value, RpcError>) {
        let Some(key) = id_key(&id) else {
            return;
        };
        let responder = self.pending.lock().await.remove(&key);
        match responder {
            Some(sender) => {
                let _ = sender.send(outcome.map_err(|error| ToolInvokeError::Rpc {
                    server: self.server.clone(),
                    error,
                }));
            }
            None => debug!(
                server = %self.server,
                response_id = key,
                "received response for unknown request"
            ),
        }
    }

    /// Requests run on their own tasks so a slow handler (sampling calls a
    /// model) never blocks responses to our own requests.
    fn handle_server_request(self: &Arc<Self>, id: Value, method: String, params: Value) {
        if method == "ping" {
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner.respond(RpcResponse::success(id, json!({}))).await;
            });
            return;
        }
        let Some(handler) = self.handlers.requests.get(&method).cloned() else {
            warn!(server = %self.server, method = method.as_str(), "server sent unsupported request");
            let inner = Arc::clone(self);
            tokio::spawn(async move {
                inner
                    .respond(RpcResponse::failure(id, RpcError::method_not_found(&method)))
                    .await;
            });
            return;
        };

        let inner = Arc::clone(self);
        let limit = Arc::clone(&self.inbound_limit);
        tokio::spawn(async move {
            let Ok(_permit) = limit.acquire_owned().await else {
                return;
            };
            debug!(server = %inner.server, method = method.as_str(), "handling server request");
            let response = match handler.handle(params).await {
                Ok(result) => RpcResponse::success(id, result),
                Err(error) => RpcResponse::failure(id, error),
            };
            inner.respond(response).await;
        });
    }

    async fn handle_notification(&self, method: String, params: Value) {
        match self.handlers.notifications.get(&method) {
            Some(handler) => handler.handle(params).await,
            None => debug!(
                server = %self.server,
                method = method.as_str(),
                "received notification from server"
            ),
        }
    }

    async fn respond(&self, response: RpcResponse) {
        let encoded = match serde_json::to_value(&response) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(server = %self.server, %err, "failed to encode response");
                return;
            }
        };
        if let Err(err) = self.write_message(&encoded).await {
            warn!(server = %self.server, %err, "failed to answer server request");
        }
    }

    /// Send a request and wait for its response. With a deadline, the
    /// pending entry is dropped when it expires.
    async fn send_request(
        &self,
        method: &str,
        params: Value,
        deadline: Option<(&str, Duration)>,
    ) -> Result<Value, ToolInvokeError> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        let request = RpcRequest::new(id.clone(), method, params);
        let encoded = serde_json::to_value(&request).map_err(|source| ToolInvokeError::InvalidJson {
            server: self.server.clone(),
            source,
        })?;
        if let Err(err) = self.write_message(&encoded).await {
            self.pending.lock().await.remove(&id);
            return Err(err);
        }

        let received = match deadline {
            None => rx.await,
            Some((label, timeout)) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    return Err(ToolInvokeError::Timeout {
                        server: self.server.clone(),
                        request: label.to_string(),
                        timeout,
                    });
                }
            },
        };
        match received {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolInvokeError::Cancelled {
                server: self.server.clone(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ToolInvokeError> {
        let notification = RpcNotification::new(method, params);
        let encoded =
            serde_json::to_value(&notification).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server.clone(),
                source,
            })?;
        self.write_message(&encoded).await
    }

    async fn write_message(&self, message: &Value) -> Result<(), ToolInvokeError> {
        let mut transport = self.transport.lock().await;
        let transport = transport.as_mut().ok_or_else(|| ToolInvokeError::NotConnected {
            server: self.server.clone(),
        })?;
        transport.send(message).await
    }

    async fn fail_all_pending(&self, error: impl Fn(String) -> ToolInvokeError) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(error(self.server.clone())));
        }
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("req-{id}")
    }
}

fn parse_tool(tool: &Value) -> Option<ToolSpec> {
    let name = tool.get("name").and_then(Value::as_str)?;
    Some(ToolSpec {
        name: name.to_string(),
        description: tool
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        input_schema: tool
            .get("inputSchema")
            .cloned()
            .unwrap_or_else(|| json!({"type": "object"})),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_declarations() {
        let tool = parse_tool(&json!({
            "name": "read_file",
            "description": "Read a file",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}
        }))
        .expect("tool");
        assert_eq!(tool.name, "read_file");
        assert_eq!(tool.description.as_deref(), Some("Read a file"));
        assert_eq!(tool.input_schema["properties"]["path"]["type"], "string");

        let bare = parse_tool(&json!({"name": "ping"})).expect("tool");
        assert_eq!(bare.input_schema, json!({"type": "object"}));
        assert!(parse_tool(&json!({"description": "nameless"})).is_none());
    }
}
