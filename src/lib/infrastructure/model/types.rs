//! Model types - Request, Response, and Error types

use crate::types::{ChatMessage, ToolCall, ToolSpec};
use thiserror::Error;

/// One generation request. The model itself is fixed by the client handling it.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call; empty for plain text generation.
    pub tools: Vec<ToolSpec>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ModelRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Model response: generated text plus any tool invocations requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// Model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unsupported model provider '{provider}' (expected google, openai or anthropic)")]
    UnsupportedProvider { provider: String },
    #[error("provider '{provider}' requires an API key")]
    MissingApiKey { provider: String },
    #[error("network error calling provider '{provider}': {source}")]
    Network {
        provider: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("provider '{provider}' answered with status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("provider '{provider}' returned invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ModelError {
    pub fn unsupported_provider(provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            provider: provider.into(),
        }
    }

    pub fn missing_api_key(provider: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
        }
    }

    pub fn network(provider: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            provider: provider.into(),
            source,
        }
    }

    pub fn status(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            provider: provider.into(),
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Transient failures worth another attempt: transport errors, request
    /// timeouts, conflicts, rate limits and server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Network { source, .. } => !source.is_decode() && !source.is_builder(),
            ModelError::Status { status, .. } => {
                matches!(status, 408 | 409 | 429) || *status >= 500
            }
            ModelError::UnsupportedProvider { .. }
            | ModelError::MissingApiKey { .. }
            | ModelError::InvalidResponse { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_statuses() {
        assert!(ModelError::status("openai", 429, "slow down").is_retryable());
        assert!(ModelError::status("openai", 503, "").is_retryable());
        assert!(ModelError::status("openai", 408, "").is_retryable());
        assert!(!ModelError::status("openai", 400, "bad").is_retryable());
        assert!(!ModelError::status("openai", 401, "").is_retryable());
        assert!(!ModelError::missing_api_key("openai").is_retryable());
        assert!(!ModelError::invalid_response("openai", "no choices").is_retryable());
    }
}
