//! Blocking client for OpenAI-compatible chat completion APIs
//! (OpenAI, DeepSeek, llama.cpp server, LM Studio, ...).

use crate::config::LlmConfig;
use crate::error::AiError;
use crate::llm::CompletionService;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str =
    "You translate requests into shell commands. Reply with a single JSON object and nothing else.";

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiClient {
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            api_base: config.resolved_endpoint(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client: reqwest::blocking::Client::new(),
        }
    }

    fn chat(&self, user: &str) -> Result<String, AiError> {
        let url = format!("{}/chat/completions", self.api_base);
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![
                Message {
                    role: "system".into(),
                    content: SYSTEM_PROMPT.into(),
                },
                Message {
                    role: "user".into(),
                    content: user.into(),
                },
            ],
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(AiError::Service(format!("API error {}: {}", status, error_text)));
        }

        let completion: ChatResponse = response.json()?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::Service("Empty response".into()))
    }
}

impl CompletionService for OpenAiClient {
    fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.chat(prompt)
    }

    fn name(&self) -> String {
        format!("openai-compatible ({} at {})", self.model, self.api_base)
    }

    fn is_available(&self) -> bool {
        let url = format!("{}/models", self.api_base);
        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder.send().map(|r| r.status().is_success()).unwrap_or(false)
    }
}
