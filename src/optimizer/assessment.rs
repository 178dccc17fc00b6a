// optimizer/assessment.rs — Rubric scoring of a prompt through the LLM

use super::rating::{is_valid_grade, normalize_grade, GRADE_TABLE, MAX_SCORE};
use super::sanitize::clean_json_response;
use super::types::{AssessmentError, OptimizationEntry, PromptAssessment};
use crate::config::MetricSpec;
use crate::llm::{generate_with_cancel, LLMAdapter};
use crate::logging::LLM_IO_TARGET;
use crate::prompt::Prompt;
use tokio_util::sync::CancellationToken;

pub(crate) const ASSESSOR_SYSTEM_PROMPT: &str =
    "You are a meticulous prompt engineering reviewer. You answer with raw JSON only.";

const ASSESSMENT_SHAPE: &str = r#"{
  "metrics": [{"name": "string", "value": 0-20, "reasoning": "string"}],
  "strengths": [{"point": "string", "example": "string"}],
  "weaknesses": [{"point": "string", "example": "string"}],
  "suggestions": [{"description": "string", "expectedImpact": 0-20, "reasoning": "string"}],
  "overallScore": 0-20,
  "overallGrade": "letter grade",
  "efficiencyScore": 0-20,
  "alignmentWithGoal": 0-20
}"#;

/// Everything the assessor needs to score one prompt.
pub struct AssessmentRequest<'a> {
    pub task_description: &'a str,
    pub optimization_goal: &'a str,
    pub prompt: &'a Prompt,
    pub recent_history: &'a [OptimizationEntry],
    pub custom_metrics: &'a [MetricSpec],
}

impl AssessmentRequest<'_> {
    pub fn build_prompt(&self) -> Prompt {
        let prompt_json = serde_json::to_string_pretty(self.prompt)
            .unwrap_or_else(|_| self.prompt.render());
        let grades = GRADE_TABLE
            .iter()
            .map(|(g, _)| *g)
            .collect::<Vec<_>>()
            .join(", ");

        let mut text = format!(
            "Assess the following prompt for the task below.\n\n\
             Task description:\n{}\n\n\
             Optimization goal:\n{}\n\n\
             Prompt to assess:\n{}",
            self.task_description.trim(),
            self.optimization_goal.trim(),
            prompt_json,
        );

        if !self.recent_history.is_empty() {
            text.push_str("\n\nRecent optimization history (oldest first):\n");
            text.push_str(&format_history(self.recent_history));
        }

        if !self.custom_metrics.is_empty() {
            text.push_str("\n\nInclude these custom metrics in \"metrics\", each scored 0-20:\n");
            for metric in self.custom_metrics {
                text.push_str(&format!("- {}: {}\n", metric.name, metric.description));
            }
        }

        text.push_str(&format!(
            "\n\nRespond with a single JSON object of exactly this shape:\n{}",
            ASSESSMENT_SHAPE
        ));

        Prompt::new(text)
            .with_system_prompt(ASSESSOR_SYSTEM_PROMPT)
            .with_directives([
                "Return raw JSON only: no markdown, no code fences, no commentary".to_string(),
                format!("Every numeric value must be between 0 and {}", MAX_SCORE),
                format!("overallGrade must be one of: {}", grades),
                "metrics, strengths, weaknesses and suggestions each need at least one item"
                    .to_string(),
                "Every strength and weakness must quote a concrete example from the prompt"
                    .to_string(),
            ])
    }
}

/// Replay of prior iterations embedded into assessment and improvement requests.
pub(crate) fn format_history(entries: &[OptimizationEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let weaknesses = entry
                .assessment
                .weaknesses
                .iter()
                .map(|w| w.point.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "{}. Prompt: {}\n   Score: {}/20, Grade: {}\n   Weaknesses: {}",
                idx + 1,
                entry.prompt.input.trim(),
                entry.assessment.overall_score,
                entry.assessment.overall_grade,
                weaknesses
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Sanitize, decode and validate a raw assessor reply.
pub fn parse_assessment(raw: &str) -> Result<PromptAssessment, AssessmentError> {
    let cleaned = clean_json_response(raw);
    let mut assessment: PromptAssessment = serde_json::from_str(&cleaned)?;
    assessment.overall_grade = normalize_grade(&assessment.overall_grade);
    validate_assessment(&assessment).map_err(AssessmentError::Validation)?;
    Ok(assessment)
}

/// Returns every violated constraint, not just the first.
pub fn validate_assessment(assessment: &PromptAssessment) -> Result<(), Vec<String>> {
    let mut issues = Vec::new();

    let non_empty = [
        ("metrics", assessment.metrics.is_empty()),
        ("strengths", assessment.strengths.is_empty()),
        ("weaknesses", assessment.weaknesses.is_empty()),
        ("suggestions", assessment.suggestions.is_empty()),
    ];
    for (field, empty) in non_empty {
        if empty {
            issues.push(format!("{} must not be empty", field));
        }
    }

    let mut check_range = |field: String, value: f64| {
        if !(0.0..=MAX_SCORE).contains(&value) {
            issues.push(format!("{} = {} is outside 0-{}", field, value, MAX_SCORE));
        }
    };
    check_range("overallScore".to_string(), assessment.overall_score);
    check_range("efficiencyScore".to_string(), assessment.efficiency_score);
    check_range("alignmentWithGoal".to_string(), assessment.alignment_with_goal);
    for metric in &assessment.metrics {
        check_range(format!("metric '{}'", metric.name), metric.value);
    }
    for suggestion in &assessment.suggestions {
        check_range("suggestion expectedImpact".to_string(), suggestion.expected_impact);
    }

    if !is_valid_grade(&assessment.overall_grade) {
        issues.push(format!("overallGrade '{}' is not a valid grade", assessment.overall_grade));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// One assessment attempt: request, sanitize, decode, validate. No retries.
pub async fn assess_prompt(
    llm: &dyn LLMAdapter,
    request: &AssessmentRequest<'_>,
    cancel: &CancellationToken,
) -> Result<PromptAssessment, AssessmentError> {
    let llm_prompt = request.build_prompt();
    tracing::debug!(target: LLM_IO_TARGET, request = %llm_prompt.render(), "assessment request");

    let raw = generate_with_cancel(llm, &llm_prompt, cancel).await?;
    tracing::debug!(target: LLM_IO_TARGET, response = %raw, "assessment response");

    parse_assessment(&raw)
}
