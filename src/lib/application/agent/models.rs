use crate::application::tooling::ToolCallResult;
use crate::config::LlmConfig;
use crate::model::RetryPolicy;
use crate::types::ToolCall;

/// Limits and sampling settings of one agent run.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Upper bound on model generations; `0` is treated as `1`.
    pub max_steps: u32,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub retry: RetryPolicy,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_tokens: None,
            temperature: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl AgentOptions {
    pub fn from_llm(llm: &LlmConfig) -> Self {
        Self {
            max_steps: llm.max_steps,
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            retry: RetryPolicy::new(llm.max_retries),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Result of one tool call made during a step.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultRecord {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: ToolCallResult,
}

/// Everything that happened in one generation step; used for reporting only.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    /// 1-based step number.
    pub index: u32,
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResultRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The model answered without requesting tools.
    Done,
    /// The step budget ran out while the model was still calling tools.
    StepLimitReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    /// Text of the last generation.
    pub text: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
}
