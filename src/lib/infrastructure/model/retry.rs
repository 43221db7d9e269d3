//! Retrying generation on transient provider failures.

use super::handle::ModelHandle;
use super::types::{ModelError, ModelRequest, ModelResponse};
use crate::constants::RETRY_INITIAL_DELAY;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: RETRY_INITIAL_DELAY,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before retry number `retry` (0-based), doubling each time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

#[derive(Debug, Error)]
#[error("generation with model '{model}' failed after {attempts} attempt(s): {source}")]
pub struct GenerationError {
    pub model: String,
    pub attempts: u32,
    #[source]
    pub source: ModelError,
}

/// Run one generation, retrying retryable failures with exponential backoff.
pub async fn generate_text(
    model: &ModelHandle,
    request: ModelRequest,
    policy: RetryPolicy,
) -> Result<ModelResponse, GenerationError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match model.generate(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_retryable() && attempt <= policy.max_retries => {
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    model = model.model_id(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %err,
                    "Generation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(source) => {
                return Err(GenerationError {
                    model: model.model_id().to_string(),
                    attempts: attempt,
                    source,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::model::handle::ModelRole;
    use crate::infrastructure::model::traits::ModelClient;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct Flaky {
        outcomes: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
        calls: Mutex<u32>,
    }

    impl Flaky {
        fn new(outcomes: Vec<Result<ModelResponse, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ModelClient for Flaky {
        fn provider(&self) -> &str {
            "test"
        }

        fn model_id(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _request: ModelRequest) -> Result<ModelResponse, ModelError> {
            *self.calls.lock().unwrap() += 1;
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::invalid_response("test", "exhausted")))
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_initial_delay(Duration::ZERO)
    }

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let policy = RetryPolicy::new(3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let client = Flaky::new(vec![
            Err(ModelError::status("test", 429, "slow down")),
            Err(ModelError::status("test", 503, "busy")),
            Ok(ModelResponse::text("done")),
        ]);
        let handle = ModelHandle::new(ModelRole::Default, client.clone());

        let response = generate_text(&handle, ModelRequest::default(), policy(2))
            .await
            .expect("response");

        assert_eq!(response.text, "done");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let client = Flaky::new(vec![
            Err(ModelError::status("test", 500, "")),
            Err(ModelError::status("test", 500, "")),
            Ok(ModelResponse::text("too late")),
        ]);
        let handle = ModelHandle::new(ModelRole::Default, client.clone());

        let err = generate_text(&handle, ModelRequest::default(), policy(1))
            .await
            .expect_err("should fail");

        assert_eq!(err.attempts, 2);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        let client = Flaky::new(vec![Err(ModelError::status("test", 400, "bad request"))]);
        let handle = ModelHandle::new(ModelRole::Default, client.clone());

        let err = generate_text(&handle, ModelRequest::default(), policy(5))
            .await
            .expect_err("should fail");

        assert_eq!(err.attempts, 1);
        assert!(matches!(err.source, ModelError::Status { status: 400, .. }));
    }
}
