use super::types::AssessmentError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fixed-delay retry for assessment attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt` is 1-based. Cancellation is never retried.
    pub fn should_retry(&self, attempt: u32, error: &AssessmentError) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }

        !matches!(error, AssessmentError::Cancelled)
    }

    /// Sleep for the fixed delay. Returns false if cancelled while waiting.
    pub async fn wait_before_retry(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        tracing::info!(
            "Retrying assessment in {}ms (attempt {}/{})",
            self.delay.as_millis(),
            attempt + 1,
            self.max_attempts
        );

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.delay) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LLMError;

    #[test]
    fn test_should_retry_until_exhausted() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let err = AssessmentError::Generation(LLMError::Timeout);
        assert!(policy.should_retry(1, &err));
        assert!(policy.should_retry(2, &err));
        assert!(!policy.should_retry(3, &err));
    }

    #[test]
    fn test_malformed_response_is_retried() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let err = AssessmentError::Validation(vec!["metrics must not be empty".into()]);
        assert!(policy.should_retry(1, &err));
    }

    #[test]
    fn test_cancel_not_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        assert!(!policy.should_retry(1, &AssessmentError::Cancelled));
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_respects_cancel() {
        let policy = RetryPolicy::new(2, Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();
        assert!(policy.wait_before_retry(1, &cancel).await);
        assert!(start.elapsed() >= Duration::from_secs(30));

        cancel.cancel();
        assert!(!policy.wait_before_retry(1, &cancel).await);
    }
}
