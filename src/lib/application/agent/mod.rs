//! # Agent Module
//!
//! Bounded multi-step tool calling on behalf of a character.
//!
//! ## Key Types
//!
//! - [`AgentLoop`] - The loop executor
//! - [`AgentOptions`] - Step budget, sampling settings and retry policy
//! - [`AgentOutcome`] - Final text, status and every step taken
//! - [`StepReporter`] - Receives each step as it finishes
//! - [`AgentError`] - Errors that end a run
//!
//! ## Agent Loop
//!
//! 1. List the callable tools
//! 2. Generate with the conversation so far
//! 3. If tool calls were requested, run them, append the results and continue
//! 4. Otherwise return the model's text

mod errors;
mod models;
pub mod prompt;
pub mod report;
mod runner;


pub use errors::{AgentError, ReportingError};
pub use models::{AgentOptions, AgentOutcome, RunStatus, StepRecord, ToolResultRecord};
pub use prompt::build_history;
pub use report::{IssueCommentReporter, StepReporter, format_step, truncate_comment};
pub use runner::AgentLoop;
