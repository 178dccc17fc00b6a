use thiserror::Error;

/// Failure of a single generation call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LLMError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid response from LLM")]
    InvalidResponse,

    #[error("All LLM providers failed")]
    AllProvidersFailed,

    #[error("Generation cancelled")]
    Cancelled,
}

impl LLMError {
    /// Returns true if the same call may succeed when repeated.
    ///
    /// Provider-level classification only. The optimizer's assessment retry
    /// ignores it and repeats every failure except cancellation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::NetworkError(_) | LLMError::Timeout | LLMError::RateLimited
        )
    }

    /// Classify a non-success HTTP status returned by a provider
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            429 => LLMError::RateLimited,
            401 | 403 => LLMError::AuthenticationError(format!("{} {}", provider, status)),
            _ => LLMError::ProviderError(format!("{} {}: {}", provider, status, body)),
        }
    }

    /// Classify a transport error raised by reqwest
    pub fn from_transport(provider: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout
        } else {
            LLMError::NetworkError(format!("{}: {}", provider, err))
        }
    }
}
