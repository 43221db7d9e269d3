use crate::application::tooling::ConnectionError;
use crate::model::GenerationError;
use crate::platform::PlatformError;
use thiserror::Error;

/// Why an agent run failed.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// A step could not be published. Logged by the loop, never fatal.
#[derive(Debug, Error)]
pub enum ReportingError {
    #[error("failed to post step comment: {0}")]
    Platform(#[from] PlatformError),
}
