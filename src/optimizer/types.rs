use crate::config::ConfigError;
use crate::llm::LLMError;
use crate::prompt::Prompt;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One rubric dimension scored on the 0-20 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub reasoning: String,
}

/// A point drawn from the prompt, with a concrete example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub point: String,
    pub example: String,
}

pub type Strength = Finding;
pub type Weakness = Finding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub description: String,
    pub expected_impact: f64,
    pub reasoning: String,
}

/// Structured critique of a prompt as returned by the assessor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAssessment {
    pub metrics: Vec<Metric>,
    pub strengths: Vec<Strength>,
    pub weaknesses: Vec<Weakness>,
    pub suggestions: Vec<Suggestion>,
    pub overall_score: f64,
    pub overall_grade: String,
    pub efficiency_score: f64,
    pub alignment_with_goal: f64,
}

/// A prompt snapshot paired with the assessment computed for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationEntry {
    pub prompt: Prompt,
    pub assessment: PromptAssessment,
    pub timestamp: DateTime<Utc>,
}

impl OptimizationEntry {
    pub fn new(prompt: Prompt, assessment: PromptAssessment) -> Self {
        Self {
            prompt,
            assessment,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("assessment request failed: {0}")]
    Generation(#[source] LLMError),

    #[error("assessment response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("assessment failed validation: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("assessment cancelled")]
    Cancelled,
}

impl From<LLMError> for AssessmentError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Cancelled => AssessmentError::Cancelled,
            other => AssessmentError::Generation(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImprovementError {
    #[error("improvement request failed: {0}")]
    Generation(#[source] LLMError),

    #[error("improvement response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("selected candidate has an empty input")]
    EmptyCandidate,

    #[error("improvement cancelled")]
    Cancelled,
}

impl From<LLMError> for ImprovementError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Cancelled => ImprovementError::Cancelled,
            other => ImprovementError::Generation(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("unknown rating system: '{0}'")]
    UnknownRatingSystem(String),
}

/// Failure of a whole optimization run. Variants raised mid-run carry the
/// best prompt seen before the failure, if any.
#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("assessment failed at iteration {iteration} after {attempts} attempts: {source}")]
    AssessmentRetriesExhausted {
        iteration: usize,
        attempts: u32,
        #[source]
        source: AssessmentError,
        best_prompt: Option<Box<Prompt>>,
    },

    #[error("optimization cancelled at iteration {iteration}")]
    Cancelled {
        iteration: usize,
        best_prompt: Option<Box<Prompt>>,
    },
}

impl OptimizerError {
    pub fn best_prompt(&self) -> Option<&Prompt> {
        match self {
            OptimizerError::AssessmentRetriesExhausted { best_prompt, .. }
            | OptimizerError::Cancelled { best_prompt, .. } => best_prompt.as_deref(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            OptimizerError::Cancelled { .. }
                | OptimizerError::AssessmentRetriesExhausted {
                    source: AssessmentError::Cancelled,
                    ..
                }
        )
    }
}
