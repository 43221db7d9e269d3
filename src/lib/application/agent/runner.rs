use super::errors::AgentError;
use super::models::{AgentOptions, AgentOutcome, RunStatus, StepRecord, ToolResultRecord};
use super::report::StepReporter;
use crate::application::tooling::ToolServerInterface;
use crate::model::{ModelHandle, ModelRequest, generate_text};
use crate::types::{ChatMessage, ToolSpec};
use tracing::{debug, info, warn};

/// Drives a model through a bounded multi-step tool-calling conversation.
pub struct AgentLoop<'a> {
    model: &'a ModelHandle,
    tools: &'a dyn ToolServerInterface,
    reporter: &'a dyn StepReporter,
    options: AgentOptions,
}

impl<'a> AgentLoop<'a> {
    pub fn new(
        model: &'a ModelHandle,
        tools: &'a dyn ToolServerInterface,
        reporter: &'a dyn StepReporter,
        options: AgentOptions,
    ) -> Self {
        Self {
            model,
            tools,
            reporter,
            options,
        }
    }

    /// Run until the model answers without tool calls or the step budget is
    /// spent. Each step is reported as soon as it finishes.
    pub async fn run(&self, messages: Vec<ChatMessage>) -> Result<AgentOutcome, AgentError> {
        let tool_specs = callable_tools(self.tools.list_tools().await?.iter().map(|tool| tool.spec()));
        let max_steps = self.options.max_steps.max(1);
        info!(
            model = self.model.model_id(),
            tools = tool_specs.len(),
            max_steps,
            "Agent run started"
        );

        let mut history = messages;
        let mut steps = Vec::new();
        let mut last_text = String::new();

        for index in 1..=max_steps {
            debug!(step = index, messages = history.len(), "Generating");
            let request = ModelRequest::new(history.clone())
                .with_tools(tool_specs.clone())
                .with_max_tokens(self.options.max_tokens)
                .with_temperature(self.options.temperature);
            let response = generate_text(self.model, request, self.options.retry).await?;

            if response.tool_calls.is_empty() {
                let step = StepRecord {
                    index,
                    text: response.text.clone(),
                    tool_calls: Vec::new(),
                    tool_results: Vec::new(),
                };
                self.publish(&step).await;
                steps.push(step);
                info!(steps = index, "Agent run finished");
                return Ok(AgentOutcome {
                    text: response.text,
                    status: RunStatus::Done,
                    steps,
                });
            }

            history.push(ChatMessage::assistant_with_tools(
                response.text.clone(),
                response.tool_calls.clone(),
            ));
            let mut tool_results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                info!(step = index, tool = call.name.as_str(), "Invoking tool");
                let result = self.tools.call_tool(&call.name, call.arguments.clone()).await;
                if result.is_error {
                    debug!(tool = call.name.as_str(), "Tool returned an error payload");
                }
                history.push(ChatMessage::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    result.text(),
                ));
                tool_results.push(ToolResultRecord {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result,
                });
            }

            let step = StepRecord {
                index,
                text: response.text.clone(),
                tool_calls: response.tool_calls,
                tool_results,
            };
            self.publish(&step).await;
            steps.push(step);
            last_text = response.text;
        }

        warn!(max_steps, "Agent stopped at step limit");
        Ok(AgentOutcome {
            text: last_text,
            status: RunStatus::StepLimitReached,
            steps,
        })
    }

    async fn publish(&self, step: &StepRecord) {
        if let Err(err) = self.reporter.report(step).await {
            warn!(step = step.index, %err, "Failed to report agent step");
        }
    }
}

/// One declaration per tool name. A later duplicate replaces the earlier one
/// in place, which is also the tool the hub routes calls to.
fn callable_tools(specs: impl IntoIterator<Item = ToolSpec>) -> Vec<ToolSpec> {
    let mut callable: Vec<ToolSpec> = Vec::new();
    for spec in specs {
        match callable.iter_mut().find(|known| known.name == spec.name) {
            Some(known) => *known = spec,
            None => callable.push(spec),
        }
    }
    callable
}
