// llm/mod.rs — LLM trait + failover orchestrator

pub mod circuit_breaker;
pub mod gemini;
pub mod metrics;
pub mod ollama;
pub mod openai_compat;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use metrics::{Metrics, ProviderStats};
pub use types::LLMError;

use crate::prompt::Prompt;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Trait for LLM text generation adapters
#[async_trait]
pub trait LLMAdapter: Send + Sync {
    /// Generate text from prompt
    async fn generate(&self, prompt: &Prompt) -> Result<String, LLMError>;

    /// Provider name
    fn name(&self) -> &str;
}

/// Run one generation call, abandoning it as soon as `cancel` fires.
pub async fn generate_with_cancel(
    llm: &dyn LLMAdapter,
    prompt: &Prompt,
    cancel: &CancellationToken,
) -> Result<String, LLMError> {
    if cancel.is_cancelled() {
        return Err(LLMError::Cancelled);
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(LLMError::Cancelled),
        result = llm.generate(prompt) => result,
    }
}

struct ProviderSlot {
    adapter: Box<dyn LLMAdapter>,
    breaker: Mutex<CircuitBreaker>,
}

/// LLM Orchestrator with sequential failover
pub struct LLMOrchestrator {
    providers: Vec<ProviderSlot>,
    metrics: Mutex<Metrics>,
    timeout: Duration,
}

impl LLMOrchestrator {
    pub fn new(adapters: Vec<Box<dyn LLMAdapter>>) -> Self {
        Self::with_settings(adapters, BreakerSettings::default(), Duration::from_secs(60))
    }

    pub fn with_settings(
        adapters: Vec<Box<dyn LLMAdapter>>,
        breaker: BreakerSettings,
        timeout: Duration,
    ) -> Self {
        let providers = adapters
            .into_iter()
            .map(|adapter| ProviderSlot {
                adapter,
                breaker: Mutex::new(CircuitBreaker::new(breaker)),
            })
            .collect();

        Self {
            providers,
            metrics: Mutex::new(Metrics::new()),
            timeout,
        }
    }

    /// Create from environment variables, adding every provider with credentials
    pub fn from_env() -> Self {
        let mut providers: Vec<Box<dyn LLMAdapter>> = Vec::new();

        // 1. OpenRouter (primary)
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.is_empty() {
                providers.push(Box::new(openai_compat::OpenAICompatAdapter::openrouter(key)));
                tracing::info!("LLM: OpenRouter adapter loaded");
            }
        }

        // 2. Groq (secondary)
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            if key.starts_with("gsk_") {
                providers.push(Box::new(openai_compat::OpenAICompatAdapter::groq(key)));
                tracing::info!("LLM: Groq adapter loaded");
            }
        }

        // 3. Gemini (tertiary)
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                providers.push(Box::new(gemini::GeminiAdapter::new(key)));
                tracing::info!("LLM: Gemini adapter loaded");
            }
        }

        // 4. Ollama (local fallback, always present)
        providers.push(Box::new(ollama::OllamaAdapter::from_env()));
        tracing::info!("LLM: Ollama adapter loaded (local fallback)");

        tracing::info!("LLM Orchestrator: {} providers available", providers.len());

        Self::new(providers)
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    fn allowed(slot: &ProviderSlot) -> bool {
        slot.breaker
            .lock()
            .map(|mut cb| cb.is_request_allowed())
            .unwrap_or(true)
    }

    fn record(&self, slot: &ProviderSlot, ok: bool, latency: Duration) {
        let name = slot.adapter.name();
        if let Ok(mut cb) = slot.breaker.lock() {
            if ok {
                cb.record_success();
            } else {
                cb.record_failure(name);
            }
        }
        if let Ok(mut m) = self.metrics.lock() {
            if ok {
                m.record_success(name, latency);
            } else {
                m.record_failure(name, latency);
            }
        }
    }
}

#[async_trait]
impl LLMAdapter for LLMOrchestrator {
    /// Generate text with failover across all providers
    async fn generate(&self, prompt: &Prompt) -> Result<String, LLMError> {
        let mut last_error = LLMError::AllProvidersFailed;

        for slot in &self.providers {
            let name = slot.adapter.name();

            if !Self::allowed(slot) {
                tracing::warn!("LLM: '{}' skipped, circuit breaker open", name);
                continue;
            }

            tracing::info!("LLM: Trying provider '{}'...", name);
            let started = Instant::now();

            let attempt = tokio::time::timeout(self.timeout, slot.adapter.generate(prompt));
            let result = match attempt.await {
                Ok(result) => result,
                Err(_) => Err(LLMError::Timeout),
            };

            match result {
                Ok(text) => {
                    self.record(slot, true, started.elapsed());
                    tracing::info!("LLM: '{}' succeeded ({} chars)", name, text.len());
                    return Ok(text);
                }
                Err(e) => {
                    self.record(slot, false, started.elapsed());
                    tracing::warn!("LLM: '{}' failed: {:?}", name, e);
                    last_error = e;
                }
            }
        }

        tracing::error!("LLM: All providers failed");
        Err(last_error)
    }

    fn name(&self) -> &str {
        "failover"
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedLLM;
    use super::*;

    fn boxed(llm: ScriptedLLM) -> Box<dyn LLMAdapter> {
        Box::new(llm)
    }

    #[tokio::test]
    async fn test_failover_to_second_provider() {
        let orchestrator = LLMOrchestrator::new(vec![
            boxed(ScriptedLLM::failing("first", LLMError::Timeout)),
            boxed(ScriptedLLM::constant("second", "hello")),
        ]);

        let text = orchestrator.generate(&Prompt::new("hi")).await.unwrap();
        assert_eq!(text, "hello");

        let metrics = orchestrator.metrics();
        assert_eq!(metrics.stats("first").failures, 1);
        assert_eq!(metrics.stats("second").successes, 1);
    }

    #[tokio::test]
    async fn test_all_fail_returns_last_error() {
        let orchestrator = LLMOrchestrator::new(vec![
            boxed(ScriptedLLM::failing("a", LLMError::Timeout)),
            boxed(ScriptedLLM::failing("b", LLMError::RateLimited)),
        ]);

        let err = orchestrator.generate(&Prompt::new("hi")).await.unwrap_err();
        assert_eq!(err, LLMError::RateLimited);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_provider() {
        let settings = BreakerSettings {
            trip_threshold: 1,
            trip_window: Duration::from_secs(60),
            cooldown: Duration::from_secs(600),
            ..BreakerSettings::default()
        };
        let first = ScriptedLLM::failing("flaky", LLMError::NetworkError("down".into()));
        let calls = first.call_counter();
        let orchestrator = LLMOrchestrator::with_settings(
            vec![boxed(first), boxed(ScriptedLLM::constant("backup", "ok"))],
            settings,
            Duration::from_secs(5),
        );

        orchestrator.generate(&Prompt::new("one")).await.unwrap();
        orchestrator.generate(&Prompt::new("two")).await.unwrap();

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_with_cancel_short_circuits() {
        let llm = ScriptedLLM::constant("x", "never");
        let calls = llm.call_counter();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = generate_with_cancel(&llm, &Prompt::new("hi"), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, LLMError::Cancelled);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
