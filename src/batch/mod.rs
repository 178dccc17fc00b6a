// batch/mod.rs — Concurrent optimization of independent prompts

mod rate_limit;

pub use rate_limit::{RateLimitCancelled, RateLimiter};

use crate::config::{BatchConfig, ConfigError, MetricSpec, OptimizerConfig};
use crate::llm::{generate_with_cancel, LLMAdapter, LLMError};
use crate::optimizer::{OptimizerError, PromptOptimizer};
use crate::prompt::Prompt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// One independent unit of batch work.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub name: String,
    pub prompt: Prompt,
    pub description: String,
    pub metrics: Vec<MetricSpec>,
    pub threshold: f64,
}

impl BatchItem {
    pub fn new(name: impl Into<String>, prompt: Prompt, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt,
            description: description.into(),
            metrics: Vec::new(),
            threshold: crate::config::DEFAULT_THRESHOLD,
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricSpec>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("rate limiter: {0}")]
    RateLimit(#[from] RateLimitCancelled),

    #[error("optimization failed: {0}")]
    Optimization(#[from] OptimizerError),

    #[error("content generation failed: {0}")]
    Generation(#[from] LLMError),

    #[error("batch cancelled before the item started")]
    Cancelled,

    #[error("batch task aborted: {0}")]
    TaskAborted(String),
}

impl BatchError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            BatchError::RateLimit(_) | BatchError::Cancelled => true,
            BatchError::Optimization(e) => e.is_cancelled(),
            BatchError::Generation(e) => *e == LLMError::Cancelled,
            BatchError::TaskAborted(_) => false,
        }
    }
}

/// Outcome for one item. `optimized_prompt` falls back to the best prompt
/// found, or the original, when the item failed.
#[derive(Debug)]
pub struct BatchResult {
    pub name: String,
    pub original_prompt: String,
    pub optimized_prompt: String,
    pub generated_content: String,
    pub error: Option<BatchError>,
}

impl BatchResult {
    fn failed(item_name: &str, original: &str, optimized: &str, error: BatchError) -> Self {
        tracing::warn!(item = item_name, "Batch item failed: {}", error);
        Self {
            name: item_name.to_string(),
            original_prompt: original.to_string(),
            optimized_prompt: optimized.to_string(),
            generated_content: String::new(),
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs one optimizer per item concurrently behind a shared rate limiter.
pub struct BatchOptimizer {
    llm: Arc<dyn LLMAdapter>,
    limiter: Arc<RateLimiter>,
    config: BatchConfig,
}

impl BatchOptimizer {
    pub fn new(llm: Arc<dyn LLMAdapter>, config: BatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let limiter = RateLimiter::new(
            config.rate_per_interval,
            Duration::from_millis(config.interval_ms),
            config.burst,
        );

        Ok(Self {
            llm,
            limiter: Arc::new(limiter),
            config,
        })
    }

    /// Optimize every item and apply its optimized prompt. Results are in
    /// input order; a failing item never affects its siblings.
    pub async fn optimize_prompts(
        &self,
        items: Vec<BatchItem>,
        cancel: &CancellationToken,
    ) -> Vec<BatchResult> {
        tracing::info!(items = items.len(), "Starting batch optimization");

        let semaphore = self.config.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let name = item.name.clone();
                let original = item.prompt.input.clone();
                let task = ItemTask {
                    llm: self.llm.clone(),
                    limiter: self.limiter.clone(),
                    config: self.item_config(&item),
                    semaphore: semaphore.clone(),
                    cancel: cancel.clone(),
                };
                (name, original, tokio::spawn(task.run(item)))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (name, original, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => BatchResult::failed(
                    &name,
                    &original,
                    &original,
                    BatchError::TaskAborted(e.to_string()),
                ),
            };
            results.push(result);
        }

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        tracing::info!(total = results.len(), failed, "Batch optimization finished");
        results
    }

    fn item_config(&self, item: &BatchItem) -> OptimizerConfig {
        OptimizerConfig {
            threshold: item.threshold,
            custom_metrics: item.metrics.clone(),
            ..self.config.optimizer.clone()
        }
    }
}

struct ItemTask {
    llm: Arc<dyn LLMAdapter>,
    limiter: Arc<RateLimiter>,
    config: OptimizerConfig,
    semaphore: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl ItemTask {
    async fn run(self, item: BatchItem) -> BatchResult {
        let original = item.prompt.input.clone();

        let _permit = match &self.semaphore {
            Some(semaphore) => {
                let acquired = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => None,
                    permit = semaphore.clone().acquire_owned() => permit.ok(),
                };
                match acquired {
                    Some(permit) => Some(permit),
                    None => {
                        return BatchResult::failed(
                            &item.name,
                            &original,
                            &original,
                            BatchError::Cancelled,
                        )
                    }
                }
            }
            None => None,
        };

        if let Err(e) = self.limiter.wait(&self.cancel).await {
            return BatchResult::failed(&item.name, &original, &original, e.into());
        }

        let optimizer = PromptOptimizer::new(self.llm.clone(), &item.description, self.config);
        let optimizer = match optimizer {
            Ok(optimizer) => optimizer,
            Err(e) => return BatchResult::failed(&item.name, &original, &original, e.into()),
        };
        let mut optimizer = optimizer.with_goal(&item.description);

        let optimized = match optimizer.optimize_prompt(item.prompt.clone(), &self.cancel).await {
            Ok(prompt) => prompt,
            Err(e) => {
                let fallback = e
                    .best_prompt()
                    .map(|p| p.input.clone())
                    .unwrap_or_else(|| original.clone());
                return BatchResult::failed(&item.name, &original, &fallback, e.into());
            }
        };

        if let Err(e) = self.limiter.wait(&self.cancel).await {
            return BatchResult::failed(&item.name, &original, &optimized.input, e.into());
        }

        match generate_with_cancel(self.llm.as_ref(), &optimized, &self.cancel).await {
            Ok(content) => {
                tracing::info!(item = %item.name, "Batch item optimized");
                BatchResult {
                    name: item.name,
                    original_prompt: original,
                    optimized_prompt: optimized.input,
                    generated_content: content,
                    error: None,
                }
            }
            Err(e) => BatchResult::failed(&item.name, &original, &optimized.input, e.into()),
        }
    }
}
