//! JSON-RPC 2.0 message shapes spoken with tool servers.

pub mod types;

pub use types::{InboundMessage, RpcError, RpcNotification, RpcRequest, RpcResponse};
