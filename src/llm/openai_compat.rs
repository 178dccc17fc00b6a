// llm/openai_compat.rs — Chat-completions adapter (OpenRouter, Groq)

use super::{LLMAdapter, LLMError};
use crate::prompt::Prompt;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENROUTER_MODELS: &[&str] = &[
    "deepseek/deepseek-r1-0528:free",
    "meta-llama/llama-3.1-8b-instruct:free",
];
const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const GROQ_MODELS: &[&str] = &["llama-3.3-70b-versatile"];

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Any endpoint speaking the OpenAI chat-completions dialect.
/// Models are tried in order until one answers.
pub struct OpenAICompatAdapter {
    client: Client,
    name: String,
    url: String,
    api_key: String,
    models: Vec<String>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAICompatAdapter {
    pub fn new(name: &str, url: &str, api_key: String, models: &[&str]) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            name: name.to_string(),
            url: url.to_string(),
            api_key,
            models: models.iter().map(|m| m.to_string()).collect(),
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    pub fn openrouter(api_key: String) -> Self {
        Self::new("openrouter", OPENROUTER_URL, api_key, OPENROUTER_MODELS)
    }

    pub fn groq(api_key: String) -> Self {
        Self::new("groq", GROQ_CHAT_URL, api_key, GROQ_MODELS)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn messages(prompt: &Prompt) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system_prompt.as_ref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: "user",
            content: prompt.render(),
        });
        messages
    }

    async fn call_model(&self, model: &str, prompt: &Prompt) -> Result<String, LLMError> {
        let request = ChatRequest {
            model,
            messages: Self::messages(prompt),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::from_transport(&self.name, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::from_status(&self.name, status, &body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LLMError::ProviderError(format!("{} parse: {}", self.name, e)))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LLMError::InvalidResponse)
    }
}

#[async_trait]
impl LLMAdapter for OpenAICompatAdapter {
    async fn generate(&self, prompt: &Prompt) -> Result<String, LLMError> {
        let mut last_error = LLMError::InvalidResponse;

        for model in &self.models {
            match self.call_model(model, prompt).await {
                Ok(text) => return Ok(text),
                // other models on the same account share the quota and key
                Err(e @ (LLMError::RateLimited | LLMError::AuthenticationError(_))) => {
                    return Err(e)
                }
                Err(e) => {
                    tracing::warn!("{} model '{}' failed: {:?}", self.name, model, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
