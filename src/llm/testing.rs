// llm/testing.rs — Scripted adapter for unit tests

use super::{LLMAdapter, LLMError};
use crate::prompt::Prompt;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Responder = dyn Fn(&Prompt, usize) -> Result<String, LLMError> + Send + Sync;

/// Adapter whose answers come from a closure receiving the prompt and the
/// zero-based call index.
pub(crate) struct ScriptedLLM {
    name: String,
    responder: Box<Responder>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl ScriptedLLM {
    pub fn new<F>(name: &str, responder: F) -> Self
    where
        F: Fn(&Prompt, usize) -> Result<String, LLMError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            responder: Box::new(responder),
            calls: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn constant(name: &str, text: &str) -> Self {
        let text = text.to_string();
        Self::new(name, move |_, _| Ok(text.clone()))
    }

    pub fn failing(name: &str, error: LLMError) -> Self {
        Self::new(name, move |_, _| Err(error.clone()))
    }

    /// Replays `responses` in order, repeating the last one once exhausted.
    pub fn sequence(name: &str, responses: Vec<Result<String, LLMError>>) -> Self {
        Self::new(name, move |_, idx| {
            let pick = idx.min(responses.len().saturating_sub(1));
            responses
                .get(pick)
                .cloned()
                .unwrap_or(Err(LLMError::InvalidResponse))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl LLMAdapter for ScriptedLLM {
    async fn generate(&self, prompt: &Prompt) -> Result<String, LLMError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.responder)(prompt, idx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Assessment JSON with every field filled and the given score and grade.
pub(crate) fn assessment_json(score: f64, grade: &str) -> String {
    serde_json::json!({
        "metrics": [{"name": "Clarity", "value": score, "reasoning": "clear enough"}],
        "strengths": [{"point": "Direct", "example": "Summarize the text"}],
        "weaknesses": [{"point": "Vague length", "example": "no word limit"}],
        "suggestions": [
            {"description": "Add a length limit", "expectedImpact": 12, "reasoning": "focus"}
        ],
        "overallScore": score,
        "overallGrade": grade,
        "efficiencyScore": 14,
        "alignmentWithGoal": 15
    })
    .to_string()
}

/// Improvement JSON with two candidates and their self-estimated impacts.
pub(crate) fn improvement_json(
    incremental: &str,
    bold: &str,
    inc_impact: f64,
    bold_impact: f64,
) -> String {
    serde_json::json!({
        "incrementalImprovement": {
            "input": incremental,
            "directives": ["Keep it short"],
            "examples": [],
            "reasoning": "small fix"
        },
        "boldRedesign": {
            "input": bold,
            "directives": ["Restructure"],
            "examples": ["Example output"],
            "reasoning": "new approach"
        },
        "expectedImpact": {"incremental": inc_impact, "bold": bold_impact}
    })
    .to_string()
}
