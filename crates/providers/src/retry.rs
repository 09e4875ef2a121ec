//! Provider retries: bounded re-attempts with a per-call timeout.
//!
//! Transient failures (timeouts, rate limits, 5xx, unparsable replies) are
//! retried after a linearly growing delay. Anything else is returned at once
//! so the caller can react (e.g. compact on a context overflow).

use async_trait::async_trait;
use asklab_core::error::ProviderError;
use asklab_core::provider::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wraps a provider with bounded retries.
pub struct RetryProvider {
    inner: Arc<dyn asklab_core::Provider>,
    attempts: u32,
    delay: Duration,
    timeout: Duration,
}

impl RetryProvider {
    /// `attempts` includes the first call; it is clamped to at least one.
    pub fn new(inner: Arc<dyn asklab_core::Provider>, attempts: u32) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }

    /// Base delay; attempt `n` waits `n * delay` before retrying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Timeout applied to every individual attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[async_trait]
impl asklab_core::Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut last_error = ProviderError::NotConfigured("No attempts made".into());

        for attempt in 1..=self.attempts {
            if attempt > 1 {
                info!(
                    provider = %self.inner.name(),
                    attempt,
                    total = self.attempts,
                    "Retrying model call"
                );
                tokio::time::sleep(self.delay * (attempt - 1)).await;
            }

            match tokio::time::timeout(self.timeout, self.inner.complete(request.clone())).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) if e.is_transient() => {
                    warn!(provider = %self.inner.name(), attempt, error = %e, "Transient provider failure");
                    last_error = e;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        timeout_secs = self.timeout.as_secs(),
                        "Provider call timed out"
                    );
                    last_error = ProviderError::Timeout(format!(
                        "Provider '{}' timed out after {}s",
                        self.inner.name(),
                        self.timeout.as_secs()
                    ));
                }
            }
        }

        Err(last_error)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
