//! Plain data shared by every layer: chat messages, tool calls and issues.

pub mod issue;
pub mod types;

pub use issue::{Issue, IssueComment, IssueRef, Label};
pub use types::{ChatMessage, MessageRole, ToolCall, ToolSpec};
