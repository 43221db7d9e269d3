//! Wire transports to tool servers.
//!
//! A transport moves whole JSON-RPC messages: outbound through
//! [`Transport::send`], inbound through the channel returned when it is
//! opened. The channel closes when the peer goes away.

use super::error::{ConnectionError, ToolInvokeError};
use crate::config::ServerDescriptor;
use crate::constants::STREAM_ENDPOINT_TIMEOUT;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Messages received from the server, in arrival order.
pub type Inbound = mpsc::UnboundedReceiver<Value>;

type BoxedWriter = BufWriter<Box<dyn AsyncWrite + Send + Unpin>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Child process speaking newline-delimited JSON over stdin/stdout.
    Process,
    /// Server-sent events in, HTTP POST out.
    Stream,
}

impl TransportKind {
    pub fn from_descriptor(descriptor: &ServerDescriptor) -> Result<Self, ConnectionError> {
        match descriptor.kind.to_ascii_lowercase().as_str() {
            "stdio" | "process" => Ok(TransportKind::Process),
            "sse" | "stream" => Ok(TransportKind::Stream),
            other => Err(ConnectionError::UnsupportedTransport {
                server: descriptor.name.clone(),
                kind: other.to_string(),
            }),
        }
    }
}

pub enum Transport {
    Process {
        server: String,
        child: Child,
        writer: BoxedWriter,
        reader: JoinHandle<()>,
    },
    Stream {
        server: String,
        http: Client,
        endpoint: Url,
        reader: JoinHandle<()>,
    },
    /// In-memory byte streams, framed like the process transport.
    Pipe {
        server: String,
        writer: BoxedWriter,
        reader: JoinHandle<()>,
    },
}

/// Opens transports for descriptors. The hub goes through this seam so
/// that tests can substitute in-memory servers.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<(Transport, Inbound), ConnectionError>;
}

/// Opens the transport named by the descriptor's `type`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTransportFactory;

#[async_trait]
impl TransportFactory for DefaultTransportFactory {
    async fn open(
        &self,
        descriptor: &ServerDescriptor,
    ) -> Result<(Transport, Inbound), ConnectionError> {
        match TransportKind::from_descriptor(descriptor)? {
            TransportKind::Process => Transport::spawn_process(descriptor),
            TransportKind::Stream => Transport::connect_stream(descriptor).await,
        }
    }
}

impl Transport {
    /// Spawn the server; its environment is ours plus the descriptor's overrides.
    pub fn spawn_process(
        descriptor: &ServerDescriptor,
    ) -> Result<(Self, Inbound), ConnectionError> {
        let server = descriptor.name.clone();
        let program = descriptor
            .command
            .as_deref()
            .filter(|command| !command.trim().is_empty())
            .ok_or_else(|| ConnectionError::InvalidDescriptor {
                server: server.clone(),
                reason: "stdio server requires a command".to_string(),
            })?;

        let mut command = Command::new(program);
        command
            .args(&descriptor.args)
            .envs(&descriptor.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| ConnectionError::Spawn {
            server: server.clone(),
            source,
        })?;
        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                return Err(ConnectionError::Spawn {
                    server,
                    source: std::io::Error::other("failed to capture server stdio"),
                });
            }
        };
        info!(server = %server, command = program, "Spawned MCP server process");

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = spawn_line_reader(server.clone(), stdout, tx);
        let writer: BoxedWriter = BufWriter::new(Box::new(stdin));
        Ok((
            Transport::Process {
                server,
                child,
                writer,
                reader,
            },
            rx,
        ))
    }

    /// Open the event stream and wait for the server to announce where
    /// outbound messages must be posted.
    pub async fn connect_stream(
        descriptor: &ServerDescriptor,
    ) -> Result<(Self, Inbound), ConnectionError> {
        let server = descriptor.name.clone();
        let stream_error = |message: String| ConnectionError::Stream {
            server: server.clone(),
            message,
        };
        let raw_url = descriptor
            .url
            .as_deref()
            .ok_or_else(|| ConnectionError::InvalidDescriptor {
                server: server.clone(),
                reason: "sse server requires a url".to_string(),
            })?;
        let url = Url::parse(raw_url).map_err(|err| ConnectionError::InvalidDescriptor {
            server: server.clone(),
            reason: format!("invalid url '{raw_url}': {err}"),
        })?;

        let http = Client::new();
        let mut source = EventSource::new(http.get(url.clone()))
            .map_err(|err| stream_error(err.to_string()))?;

        let announced = tokio::time::timeout(STREAM_ENDPOINT_TIMEOUT, async {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => debug!(server = %server, "Event stream opened"),
                    Ok(Event::Message(message)) if message.event == "endpoint" => {
                        return url
                            .join(message.data.trim())
                            .map_err(|err| format!("invalid endpoint '{}': {err}", message.data));
                    }
                    Ok(Event::Message(message)) => debug!(
                        server = %server,
                        event = message.event.as_str(),
                        "Ignoring event received before endpoint"
                    ),
                    Err(err) => return Err(err.to_string()),
                }
            }
            Err("event stream ended before endpoint event".to_string())
        })
        .await;

        let endpoint = match announced {
            Ok(Ok(endpoint)) => endpoint,
            Ok(Err(message)) => {
                source.close();
                return Err(stream_error(message));
            }
            Err(_) => {
                source.close();
                return Err(stream_error(format!(
                    "no endpoint event within {}s",
                    STREAM_ENDPOINT_TIMEOUT.as_secs()
                )));
            }
        };
        info!(server = %server, endpoint = %endpoint, "Connected to MCP event stream");

        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(stream_reader(server.clone(), source, tx));
        Ok((
            Transport::Stream {
                server,
                http,
                endpoint,
                reader,
            },
            rx,
        ))
    }

    /// Frame arbitrary byte streams as a transport.
    pub fn pipe<R, W>(server: impl Into<String>, reader: R, writer: W) -> (Self, Inbound)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let server = server.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = spawn_line_reader(server.clone(), reader, tx);
        let writer: BoxedWriter = BufWriter::new(Box::new(writer));
        (
            Transport::Pipe {
                server,
                writer,
                reader,
            },
            rx,
        )
    }

    pub fn server(&self) -> &str {
        match self {
            Transport::Process { server, .. }
            | Transport::Stream { server, .. }
            | Transport::Pipe { server, .. } => server,
        }
    }

    pub async fn send(&mut self, message: &Value) -> Result<(), ToolInvokeError> {
        let encoded =
            serde_json::to_string(message).map_err(|source| ToolInvokeError::InvalidJson {
                server: self.server().to_string(),
                source,
            })?;
        match self {
            Transport::Process { server, writer, .. } | Transport::Pipe { server, writer, .. } => {
                write_line(writer, &encoded)
                    .await
                    .map_err(|source| ToolInvokeError::Transport {
                        server: server.clone(),
                        message: source.to_string(),
                    })
            }
            Transport::Stream {
                server,
                http,
                endpoint,
                ..
            } => {
                http.post(endpoint.clone())
                    .header("Content-Type", "application/json")
                    .body(encoded)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(|source| ToolInvokeError::Transport {
                        server: server.clone(),
                        message: source.to_string(),
                    })?;
                Ok(())
            }
        }
    }

    /// Release the transport. Background readers are stopped even when
    /// shutting down the peer fails.
    pub async fn close(self) -> Result<(), ToolInvokeError> {
        match self {
            Transport::Process {
                server,
                mut child,
                writer,
                reader,
            } => {
                drop(writer);
                reader.abort();
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!(server = %server, %status, "MCP server process already exited");
                        Ok(())
                    }
                    _ => child
                        .kill()
                        .await
                        .map_err(|source| ToolInvokeError::Transport {
                            server,
                            message: format!("failed to stop server process: {source}"),
                        }),
                }
            }
            Transport::Stream { reader, .. } => {
                reader.abort();
                Ok(())
            }
            Transport::Pipe {
                server,
                mut writer,
                reader,
            } => {
                reader.abort();
                writer
                    .shutdown()
                    .await
                    .map_err(|source| ToolInvokeError::Transport {
                        server,
                        message: source.to_string(),
                    })
            }
        }
    }
}

async fn write_line(writer: &mut BoxedWriter, encoded: &str) -> std::io::Result<()> {
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn spawn_line_reader<R>(server: String, reader: R, tx: mpsc::UnboundedSender<Value>) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(raw)) => {
                    let trimmed = raw.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if trimmed.starts_with('\u{1b}') {
                        debug!(
                            server = %server,
                            line = trimmed,
                            "skipping non-JSON ANSI log line from MCP server"
                        );
                        continue;
                    }
                    match serde_json::from_str::<Value>(trimmed) {
                        Ok(value) => {
                            if tx.send(value).is_err() {
                                break;
                            }
                        }
                        Err(source) => warn!(
                            server = %server,
                            line = trimmed,
                            %source,
                            "received invalid JSON from MCP server"
                        ),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(server = %server, %err, "failed to read from MCP server");
                    break;
                }
            }
        }
        debug!(server = %server, "MCP server output closed");
    })
}

async fn stream_reader(server: String, mut source: EventSource, tx: mpsc::UnboundedSender<Value>) {
    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Message(message)) if message.event == "message" => {
                match serde_json::from_str::<Value>(&message.data) {
                    Ok(value) => {
                        if tx.send(value).is_err() {
                            break;
                        }
                    }
                    Err(source) => warn!(
                        server = %server,
                        %source,
                        "received invalid JSON event from MCP server"
                    ),
                }
            }
            Ok(_) => {}
            Err(reqwest_eventsource::Error::StreamEnded) => break,
            Err(err) => {
                warn!(server = %server, %err, "MCP event stream failed");
                break;
            }
        }
    }
    source.close();
    debug!(server = %server, "MCP event stream closed");
}
