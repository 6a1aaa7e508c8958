//! Per-node retry policy: classification, attempt tracking, and full-jitter
//! exponential backoff (§4.6).
//!
//! Backoff is `delay = min(max_delay, base_delay * 2^attempt)`, then
//! `sampled = rng.uniform(0, delay)` — "full jitter" rather than the
//! multiply-by-0.5..1.5 jitter some retry libraries use. The RNG is always
//! the work-item-scoped RNG (`crate::context::InvocationContext::rng`), which
//! is what lets a replay reproduce timing within sleep granularity.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Classifies an error as retryable or not. Defaults to "retry everything",
/// matching the common case of a single uniform transient-error policy.
pub type Classifier = Arc<dyn Fn(&crate::error::EngineError) -> bool + Send + Sync>;

/// A node's retry policy.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    classifier: Classifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy {
    /// A policy that retries any error up to `max_attempts` times total.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            classifier: Arc::new(|_| true),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Restrict retries to errors this function returns `true` for. Errors
    /// the classifier rejects are surfaced immediately, never retried, even
    /// if attempts remain.
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&crate::error::EngineError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn retryable(&self, error: &crate::error::EngineError) -> bool {
        (self.classifier)(error)
    }

    /// True if a retry should be scheduled for a failure at `attempt`
    /// (0-indexed, the value the work item currently carries).
    pub fn should_retry(&self, attempt: u32, error: &crate::error::EngineError) -> bool {
        self.retryable(error) && attempt + 1 < self.max_attempts
    }

    /// Compute the full-jitter backoff delay for a failure at `attempt`,
    /// sampling from the given RNG.
    pub fn backoff_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let capped = self.capped_delay(attempt);
        if capped.is_zero() {
            return capped;
        }
        let sampled_millis = rng.gen_range(0..=capped.as_millis().max(1) as u64);
        let delay = Duration::from_millis(sampled_millis);
        tracing::debug!(attempt, ?capped, ?delay, "computed retry backoff");
        delay
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let scaled = self.base_delay.saturating_mul(factor as u32);
        scaled.min(self.max_delay)
    }
}
