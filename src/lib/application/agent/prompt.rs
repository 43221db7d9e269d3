//! Conversation seed built from an issue.

use crate::config::RunContext;
use crate::domain::{ChatMessage, Issue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct PromptContext<'a> {
    #[serde(rename = "WORKSPACE")]
    workspace: String,
    #[serde(rename = "REPO")]
    repo: &'a str,
    #[serde(rename = "OWNER")]
    owner: &'a str,
    #[serde(rename = "CURRENT_BRANCH")]
    branch: &'a str,
    #[serde(rename = "ISSUE_ID")]
    issue_id: u64,
    #[serde(rename = "CURRENT_TIME")]
    current_time: String,
}

/// System message with run context and character prompt, the issue itself,
/// then every comment in order as a user message.
pub fn build_history(
    context: &RunContext,
    system_prompt: &str,
    issue: &Issue,
    now: DateTime<Utc>,
) -> Vec<ChatMessage> {
    let prompt_context = PromptContext {
        workspace: context.workspace.display().to_string(),
        repo: &context.repo,
        owner: &context.owner,
        branch: &context.branch,
        issue_id: issue.id,
        current_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    };
    let context_json = serde_json::to_string(&prompt_context).unwrap_or_else(|_| "{}".to_string());

    let mut messages = Vec::with_capacity(issue.comments.len() + 2);
    messages.push(ChatMessage::system(format!(
        "<context>{context_json}</context>\n<character>{system_prompt}</character>"
    )));
    messages.push(ChatMessage::user(format!(
        "<title>{}</title><content>{}</content>",
        issue.title, issue.content
    )));
    messages.extend(
        issue
            .comments
            .iter()
            .map(|comment| ChatMessage::user(comment.content.clone())),
    );
    messages
}
