//! Iterative prompt optimization driven by an LLM.
//!
//! A [`PromptOptimizer`] repeatedly asks the model to assess a prompt,
//! checks the assessment against a convergence policy and, when the goal
//! is not met, asks for an improved prompt. The best-scoring prompt is
//! returned. [`BatchOptimizer`] runs many independent optimizations
//! concurrently behind a shared rate limiter.

pub mod batch;
pub mod config;
pub mod llm;
pub mod logging;
pub mod optimizer;
pub mod prompt;

pub use batch::{BatchError, BatchItem, BatchOptimizer, BatchResult, RateLimiter};
pub use config::{BatchConfig, ConfigError, MetricSpec, OptimizerConfig};
pub use llm::{LLMAdapter, LLMError, LLMOrchestrator};
pub use optimizer::{OptimizationEntry, OptimizerError, PromptAssessment, PromptOptimizer};
pub use prompt::Prompt;
