//! Connections to MCP tool servers and the hub aggregating them.

mod connection;
mod error;
mod hub;
pub mod sampling;
mod transport;

pub use connection::{
    InboundHandlers, LoggingHandler, NotificationHandler, RequestHandler, ToolCallResult,
    ToolServerConnection,
};
pub use error::{ConnectionError, ToolInvokeError};
pub use hub::{ToolDescriptor, ToolHub, ToolServerInterface};
pub use sampling::{CreateMessageParams, ModelPreferences, SamplingHandler, resolve_model};
pub use transport::{DefaultTransportFactory, Inbound, Transport, TransportFactory, TransportKind};
