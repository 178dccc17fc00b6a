// optimizer/mod.rs — Iterative assess/improve loop

pub mod assessment;
pub mod improvement;
pub mod rating;
pub mod retry;
pub mod sanitize;
mod types;

pub use types::{
    AssessmentError, Finding, ImprovementError, Metric, OptimizationEntry, OptimizerError,
    PromptAssessment, RatingError, Strength, Suggestion, Weakness,
};

use crate::config::OptimizerConfig;
use crate::llm::LLMAdapter;
use crate::prompt::Prompt;
use assessment::{assess_prompt, AssessmentRequest};
use improvement::{generate_improvement, ImprovementRequest};
use retry::RetryPolicy;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub const DEFAULT_OPTIMIZATION_GOAL: &str =
    "Raise the prompt's overall assessment score by making it clearer and more task-specific";

/// Called after every completed iteration with the 1-based iteration number.
pub type IterationObserver = Box<dyn Fn(usize, &OptimizationEntry) + Send + Sync>;

/// Runs the assess → decide → improve loop for one prompt at a time.
///
/// Holds the history of the most recent run. Not meant to be shared between
/// concurrent runs; build one optimizer per task.
pub struct PromptOptimizer {
    llm: Arc<dyn LLMAdapter>,
    config: OptimizerConfig,
    task_description: String,
    optimization_goal: String,
    observer: Option<IterationObserver>,
    history: Vec<OptimizationEntry>,
    best: Option<(Prompt, f64)>,
}

impl PromptOptimizer {
    pub fn new(
        llm: Arc<dyn LLMAdapter>,
        task_description: impl Into<String>,
        config: OptimizerConfig,
    ) -> Result<Self, OptimizerError> {
        config.validate()?;

        Ok(Self {
            llm,
            config,
            task_description: task_description.into(),
            optimization_goal: DEFAULT_OPTIMIZATION_GOAL.to_string(),
            observer: None,
            history: Vec::new(),
            best: None,
        })
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.optimization_goal = goal.into();
        self
    }

    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(usize, &OptimizationEntry) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Every entry of the last run, oldest first.
    pub fn history(&self) -> &[OptimizationEntry] {
        &self.history
    }

    /// The trailing `memory_size` entries, oldest first.
    pub fn recent_history(&self) -> &[OptimizationEntry] {
        let start = self.history.len().saturating_sub(self.config.memory_size);
        &self.history[start..]
    }

    pub fn best_prompt(&self) -> Option<&Prompt> {
        self.best.as_ref().map(|(prompt, _)| prompt)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|(_, score)| *score)
    }

    /// Optimize `prompt` until the rating goal is met or iterations run out.
    ///
    /// Convergence returns the prompt that met the goal. Running out of
    /// iterations returns the best-scoring prompt seen. Exhausting the
    /// assessment retries aborts with an error carrying that best prompt.
    pub async fn optimize_prompt(
        &mut self,
        prompt: Prompt,
        cancel: &CancellationToken,
    ) -> Result<Prompt, OptimizerError> {
        prompt.validate().map_err(OptimizerError::InvalidPrompt)?;

        self.history.clear();
        self.best = None;

        let span = tracing::info_span!("optimize", run_id = %uuid::Uuid::new_v4());
        self.run(prompt, cancel).instrument(span).await
    }

    async fn run(
        &mut self,
        prompt: Prompt,
        cancel: &CancellationToken,
    ) -> Result<Prompt, OptimizerError> {
        let mut current = prompt;
        let iterations = self.config.iterations;

        tracing::info!(
            iterations,
            rating_system = %self.config.rating_system,
            threshold = self.config.threshold,
            "Starting prompt optimization"
        );

        for iteration in 1..=iterations {
            let assessment = self.assess_with_retry(&current, iteration, cancel).await?;
            let score = assessment.overall_score;

            let entry = OptimizationEntry::new(current.clone(), assessment);
            self.history.push(entry);
            let entry = &self.history[self.history.len() - 1];

            if let Some(observer) = &self.observer {
                observer(iteration, entry);
            }

            tracing::info!(
                iteration,
                score,
                grade = %entry.assessment.overall_grade,
                "Iteration assessed"
            );

            // strict: the first prompt to reach a score keeps it
            let improved = match &self.best {
                Some((_, best_score)) => score > *best_score,
                None => true,
            };
            if improved {
                self.best = Some((current.clone(), score));
            }

            let goal = rating::is_goal_met(
                &self.config.rating_system,
                self.config.threshold,
                &entry.assessment,
            );
            match goal {
                Ok(true) => {
                    tracing::info!(iteration, score, "Optimization goal met");
                    return Ok(current);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(iteration, "Could not evaluate optimization goal: {}", e);
                }
            }

            if iteration == iterations {
                break;
            }

            let previous = &self.history[self.history.len() - 1];
            let request = ImprovementRequest {
                task_description: &self.task_description,
                optimization_goal: &self.optimization_goal,
                previous,
                recent_history: self.recent_history(),
            };

            match generate_improvement(self.llm.as_ref(), &request, cancel).await {
                Ok(next) => current = next,
                Err(ImprovementError::Cancelled) => {
                    return Err(OptimizerError::Cancelled {
                        iteration,
                        best_prompt: self.best_boxed(),
                    });
                }
                Err(e) => {
                    // the same prompt is re-assessed next iteration
                    tracing::warn!(iteration, "Improvement failed, keeping current prompt: {}", e);
                }
            }
        }

        let best = self.best_prompt().cloned().unwrap_or(current);
        tracing::info!(
            best_score = self.best_score().unwrap_or_default(),
            "Iterations exhausted without meeting the goal"
        );
        Ok(best)
    }

    async fn assess_with_retry(
        &self,
        prompt: &Prompt,
        iteration: usize,
        cancel: &CancellationToken,
    ) -> Result<PromptAssessment, OptimizerError> {
        let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_delay());
        let request = AssessmentRequest {
            task_description: &self.task_description,
            optimization_goal: &self.optimization_goal,
            prompt,
            recent_history: self.recent_history(),
            custom_metrics: &self.config.custom_metrics,
        };

        let mut attempt = 1;
        loop {
            match assess_prompt(self.llm.as_ref(), &request, cancel).await {
                Ok(assessment) => return Ok(assessment),
                Err(AssessmentError::Cancelled) => {
                    return Err(OptimizerError::Cancelled {
                        iteration,
                        best_prompt: self.best_boxed(),
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        iteration,
                        "Assessment attempt {}/{} failed: {}",
                        attempt,
                        policy.max_attempts(),
                        e
                    );

                    if !policy.should_retry(attempt, &e) {
                        tracing::error!(
                            iteration,
                            attempts = attempt,
                            "Assessment retries exhausted"
                        );
                        return Err(OptimizerError::AssessmentRetriesExhausted {
                            iteration,
                            attempts: attempt,
                            source: e,
                            best_prompt: self.best_boxed(),
                        });
                    }

                    if !policy.wait_before_retry(attempt, cancel).await {
                        return Err(OptimizerError::Cancelled {
                            iteration,
                            best_prompt: self.best_boxed(),
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn best_boxed(&self) -> Option<Box<Prompt>> {
        self.best_prompt().cloned().map(Box::new)
    }
}
