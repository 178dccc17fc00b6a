// optimizer/improvement.rs — Two-candidate rewrite and impact-based pick

use super::assessment::format_history;
use super::sanitize::clean_json_response;
use super::types::{ImprovementError, OptimizationEntry};
use crate::llm::{generate_with_cancel, LLMAdapter};
use crate::logging::LLM_IO_TARGET;
use crate::prompt::Prompt;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub(crate) const IMPROVER_SYSTEM_PROMPT: &str =
    "You are an expert prompt engineer who rewrites prompts. You answer with raw JSON only.";

const IMPROVEMENT_SHAPE: &str = r#"{
  "incrementalImprovement": {"input": "string", "directives": ["string"], "examples": ["string"], "reasoning": "string"},
  "boldRedesign": {"input": "string", "directives": ["string"], "examples": ["string"], "reasoning": "string"},
  "expectedImpact": {"incremental": 0-20, "bold": 0-20}
}"#;

#[derive(Debug, Clone, Deserialize)]
pub struct CandidatePrompt {
    pub input: String,
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExpectedImpact {
    pub incremental: f64,
    pub bold: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImprovementResponse {
    pub incremental_improvement: CandidatePrompt,
    pub bold_redesign: CandidatePrompt,
    pub expected_impact: ExpectedImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Incremental,
    Bold,
}

impl ImprovementResponse {
    /// Bold wins only with a strictly higher expected impact.
    pub fn select(&self) -> (CandidateKind, &CandidatePrompt) {
        if self.expected_impact.bold > self.expected_impact.incremental {
            (CandidateKind::Bold, &self.bold_redesign)
        } else {
            (CandidateKind::Incremental, &self.incremental_improvement)
        }
    }
}

pub struct ImprovementRequest<'a> {
    pub task_description: &'a str,
    pub optimization_goal: &'a str,
    pub previous: &'a OptimizationEntry,
    pub recent_history: &'a [OptimizationEntry],
}

impl ImprovementRequest<'_> {
    pub fn build_prompt(&self) -> Prompt {
        let previous_json = serde_json::to_string_pretty(&self.previous.prompt)
            .unwrap_or_else(|_| self.previous.prompt.render());
        let assessment_json = serde_json::to_string_pretty(&self.previous.assessment)
            .unwrap_or_default();

        let mut text = format!(
            "Improve the prompt below for the task described.\n\n\
             Task description:\n{}\n\n\
             Optimization goal:\n{}\n\n\
             Current prompt:\n{}\n\n\
             Assessment of the current prompt:\n{}",
            self.task_description.trim(),
            self.optimization_goal.trim(),
            previous_json,
            assessment_json,
        );

        if !self.recent_history.is_empty() {
            text.push_str("\n\nRecent optimization history (oldest first):\n");
            text.push_str(&format_history(self.recent_history));
        }

        text.push_str(&format!(
            "\n\nProduce exactly two alternatives:\n\
             1. incrementalImprovement keeps the current structure and fixes the weaknesses.\n\
             2. boldRedesign restructures the approach entirely.\n\
             Estimate the expected impact of each on the 0-20 scale.\n\n\
             Respond with a single JSON object of exactly this shape:\n{}",
            IMPROVEMENT_SHAPE
        ));

        Prompt::new(text)
            .with_system_prompt(IMPROVER_SYSTEM_PROMPT)
            .with_directives([
                "Return raw JSON only: no markdown, no code fences, no commentary",
                "Each alternative must be a complete prompt, not a diff",
                "Both expectedImpact values must be between 0 and 20",
            ])
    }
}

pub fn parse_improvement(raw: &str) -> Result<ImprovementResponse, ImprovementError> {
    let cleaned = clean_json_response(raw);
    Ok(serde_json::from_str(&cleaned)?)
}

/// Build the next working prompt from a candidate. The candidate schema has
/// no system text, context or output format, so those carry over.
pub fn apply_candidate(previous: &Prompt, candidate: &CandidatePrompt) -> Prompt {
    Prompt {
        input: candidate.input.trim().to_string(),
        system_prompt: previous.system_prompt.clone(),
        directives: candidate.directives.clone(),
        examples: candidate.examples.clone(),
        context: previous.context.clone(),
        output_format: previous.output_format.clone(),
    }
}

/// One improvement attempt. Errors go back to the caller untouched.
pub async fn generate_improvement(
    llm: &dyn LLMAdapter,
    request: &ImprovementRequest<'_>,
    cancel: &CancellationToken,
) -> Result<Prompt, ImprovementError> {
    let llm_prompt = request.build_prompt();
    tracing::debug!(target: LLM_IO_TARGET, request = %llm_prompt.render(), "improvement request");

    let raw = generate_with_cancel(llm, &llm_prompt, cancel).await?;
    tracing::debug!(target: LLM_IO_TARGET, response = %raw, "improvement response");

    let response = parse_improvement(&raw)?;
    let (kind, candidate) = response.select();
    if candidate.input.trim().is_empty() {
        return Err(ImprovementError::EmptyCandidate);
    }

    tracing::info!(
        candidate = ?kind,
        incremental_impact = response.expected_impact.incremental,
        bold_impact = response.expected_impact.bold,
        "Selected improvement candidate"
    );

    Ok(apply_candidate(&request.previous.prompt, candidate))
}
