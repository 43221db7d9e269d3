//! Publishing agent steps as issue comments.

use super::errors::ReportingError;
use super::models::StepRecord;
use crate::constants::COMMENT_PREFIX;
use crate::domain::IssueRef;
use crate::platform::Platform;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const TRUNCATION_MARKER: &str = "\n\n...[truncated]";

/// Receives every step of an agent run as it completes.
#[async_trait]
pub trait StepReporter: Send + Sync {
    async fn report(&self, step: &StepRecord) -> Result<(), ReportingError>;
}

/// Posts each step as a comment on the issue being worked on.
pub struct IssueCommentReporter {
    platform: Arc<dyn Platform>,
    issue: IssueRef,
}

impl IssueCommentReporter {
    pub fn new(platform: Arc<dyn Platform>, issue: IssueRef) -> Self {
        Self { platform, issue }
    }
}

#[async_trait]
impl StepReporter for IssueCommentReporter {
    async fn report(&self, step: &StepRecord) -> Result<(), ReportingError> {
        let Some(body) = format_step(step) else {
            debug!(step = step.index, "Nothing to report for step");
            return Ok(());
        };
        let body = truncate_comment(&body, self.platform.max_comment_len());
        self.platform
            .create_issue_comment(&self.issue, &body)
            .await?;
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallView<'a> {
    tool_name: &'a str,
    args: &'a Value,
    tool_call_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultView<'a> {
    tool_name: &'a str,
    result: &'a Value,
    tool_call_id: &'a str,
}

/// Comment body for a step: the prefix line, then the step text, tool calls
/// and tool results separated by blank lines. `None` when the step has
/// nothing to show.
pub fn format_step(step: &StepRecord) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if !step.text.trim().is_empty() {
        parts.push(step.text.clone());
    }
    for call in &step.tool_calls {
        let view = ToolCallView {
            tool_name: &call.name,
            args: &call.arguments,
            tool_call_id: &call.id,
        };
        parts.push(internal_block("Tool Call", &view));
    }
    for record in &step.tool_results {
        let view = ToolResultView {
            tool_name: &record.tool_name,
            result: &record.result.output,
            tool_call_id: &record.tool_call_id,
        };
        parts.push(internal_block("Tool Result", &view));
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("{COMMENT_PREFIX}\n{}", parts.join("\n\n")))
}

fn internal_block<T: Serialize>(title: &str, view: &T) -> String {
    let json = serde_json::to_string_pretty(view).unwrap_or_else(|_| "{}".to_string());
    format!("[INTERNAL]{title}:\n```json\n{json}\n```")
}

/// Cut `body` to at most `max_chars` characters, marking the cut when the
/// limit leaves room for the marker and some content.
pub fn truncate_comment(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return body.chars().take(max_chars).collect();
    }
    let keep = max_chars - marker_len;
    let cut = body
        .char_indices()
        .nth(keep)
        .map(|(index, _)| index)
        .unwrap_or(body.len());
    let mut truncated = body[..cut].to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
