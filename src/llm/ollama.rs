// llm/ollama.rs — Ollama local LLM adapter

use super::{LLMAdapter, LLMError};
use crate::prompt::Prompt;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODELS: &[&str] = &["qwen2.5:1.5b", "llama3.2", "mistral"];

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

pub struct OllamaAdapter {
    client: Client,
    host: String,
    models: Vec<String>,
}

impl OllamaAdapter {
    pub fn new(host: impl Into<String>, models: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            client,
            host: host.into(),
            models,
        }
    }

    /// Host from `OLLAMA_HOST`, single model from `OLLAMA_MODEL`, otherwise
    /// the local default chain.
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let models = match std::env::var("OLLAMA_MODEL") {
            Ok(model) if !model.trim().is_empty() => vec![model.trim().to_string()],
            _ => DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        };
        Self::new(host, models)
    }

    async fn call_model(&self, model: &str, prompt: &Prompt) -> Result<String, LLMError> {
        let request = OllamaRequest {
            model,
            prompt: prompt.render(),
            system: prompt.system_prompt.as_deref().filter(|s| !s.trim().is_empty()),
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 2048,
            },
        };

        let url = format!("{}/api/generate", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::from_transport("ollama", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(&format!("ollama {}", model), status, &body));
        }

        let ollama: OllamaResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ProviderError(format!("Ollama parse: {}", e)))?;

        if ollama.response.trim().is_empty() {
            return Err(LLMError::InvalidResponse);
        }

        Ok(ollama.response)
    }
}

#[async_trait]
impl LLMAdapter for OllamaAdapter {
    async fn generate(&self, prompt: &Prompt) -> Result<String, LLMError> {
        let mut last_error = LLMError::InvalidResponse;

        for model in &self.models {
            match self.call_model(model, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!("Ollama '{}' failed: {:?}", model, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
