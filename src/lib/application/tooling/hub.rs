//! One callable tool set over every tool server of a character.

use super::connection::{InboundHandlers, LoggingHandler, ToolCallResult, ToolServerConnection};
use super::error::{ConnectionError, ToolInvokeError};
use super::sampling::SamplingHandler;
use super::transport::{DefaultTransportFactory, TransportFactory};
use crate::config::ServerDescriptor;
use crate::constants::TOOL_CALL_TIMEOUT;
use crate::model::{ModelSet, RetryPolicy};
use crate::types::ToolSpec;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A tool as exposed by the hub, tagged with the server providing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
    /// Name of the owning server; never empty.
    pub server: String,
    /// Index of the owning connection inside the hub.
    pub connection: usize,
}

impl ToolDescriptor {
    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// What the agent loop needs from a set of tool servers.
#[async_trait]
pub trait ToolServerInterface: Send + Sync {
    /// Current callable tools; also becomes the routing table for `call_tool`.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ConnectionError>;

    /// Invoke a tool by name. Never fails; errors are reported in the result.
    async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult;
}

pub struct ToolHub {
    servers: Vec<ServerDescriptor>,
    factory: Arc<dyn TransportFactory>,
    call_timeout: Duration,
    connections: Vec<(ServerDescriptor, ToolServerConnection)>,
    catalog: RwLock<Vec<ToolDescriptor>>,
}

impl ToolHub {
    pub fn new(servers: Vec<ServerDescriptor>) -> Self {
        Self {
            servers,
            factory: Arc::new(DefaultTransportFactory),
            call_timeout: TOOL_CALL_TIMEOUT,
            connections: Vec::new(),
            catalog: RwLock::new(Vec::new()),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connect to every server in configuration order.
    ///
    /// The first failure closes the connections opened so far and is
    /// returned; the hub is then left without connections.
    pub async fn connect_all(
        &mut self,
        models: &ModelSet,
        policy: RetryPolicy,
    ) -> Result<(), ConnectionError> {
        if !self.connections.is_empty() {
            debug!("Tool hub already connected");
            return Ok(());
        }
        for descriptor in &self.servers {
            let handlers = InboundHandlers::default()
                .on_notification(
                    "notifications/message",
                    Arc::new(LoggingHandler::new(descriptor.name.clone())),
                )
                .on_request(
                    "sampling/createMessage",
                    Arc::new(SamplingHandler::new(
                        descriptor.name.clone(),
                        models.clone(),
                        policy,
                    )),
                );
            match ToolServerConnection::connect(descriptor, self.factory.as_ref(), handlers).await {
                Ok(connection) => self.connections.push((descriptor.clone(), connection)),
                Err(err) => {
                    warn!(server = %descriptor.name, %err, "Connecting tool servers failed");
                    let opened = std::mem::take(&mut self.connections);
                    for (descriptor, connection) in opened {
                        if let Err(close_err) = connection.close().await {
                            debug!(server = %descriptor.name, %close_err, "Close after failed connect");
                        }
                    }
                    return Err(err);
                }
            }
        }
        info!(servers = self.connections.len(), "Tool servers connected");
        Ok(())
    }

    /// Close every connection concurrently. Close failures are logged and
    /// returned, never raised.
    pub async fn disconnect_all(&mut self) -> Vec<(String, ToolInvokeError)> {
        let connections = std::mem::take(&mut self.connections);
        self.catalog.write().await.clear();
        let results = join_all(connections.into_iter().map(|(descriptor, connection)| async move {
            (descriptor.name, connection.close().await)
        }))
        .await;

        results
            .into_iter()
            .filter_map(|(server, result)| match result {
                Ok(()) => None,
                Err(err) => {
                    warn!(server = %server, %err, "Failed to close tool server");
                    Some((server, err))
                }
            })
            .collect()
    }
}

#[async_trait]
impl ToolServerInterface for ToolHub {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ConnectionError> {
        let listings = join_all(
            self.connections
                .iter()
                .map(|(_, connection)| connection.list_tools()),
        )
        .await;

        let mut tools = Vec::new();
        for (index, ((descriptor, _), listing)) in self.connections.iter().zip(listings).enumerate() {
            let listed = listing.map_err(|source| ConnectionError::ListTools {
                server: descriptor.name.clone(),
                source,
            })?;
            let total = listed.len();
            let allowed: Vec<ToolDescriptor> = listed
                .into_iter()
                .filter(|tool| descriptor.allows(&tool.name))
                .map(|tool| ToolDescriptor {
                    name: tool.name,
                    description: tool.description,
                    input_schema: tool.input_schema,
                    server: descriptor.name.clone(),
                    connection: index,
                })
                .collect();
            debug!(
                server = %descriptor.name,
                listed = total,
                allowed = allowed.len(),
                "Tools filtered by whitelist"
            );
            tools.extend(allowed);
        }

        *self.catalog.write().await = tools.clone();
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> ToolCallResult {
        let target = {
            let catalog = self.catalog.read().await;
            catalog
                .iter()
                .rev()
                .find(|tool| tool.name == name)
                .and_then(|tool| self.connections.get(tool.connection))
                .map(|(_, connection)| connection.clone())
        };
        match target {
            Some(connection) => {
                debug!(server = connection.server(), tool = name, "Routing tool call");
                connection.call_tool(name, arguments, self.call_timeout).await
            }
            None => {
                let err = ToolInvokeError::UnknownTool {
                    tool: name.to_string(),
                };
                warn!(tool = name, "Model called a tool no server provides");
                ToolCallResult::from_error(&err)
            }
        }
    }
}
