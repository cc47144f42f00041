use crate::config::LlmConfig;
use crate::error::{AiError, StoreError};
use crate::llm::CompletionService;
use crate::vector_store::Embedder;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaGenerate {
    model: String,
    prompt: String,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct OllamaEmbed {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaClient {
    base_url: String,
    model: String,
    embed_model: String,
    temperature: f32,
    max_tokens: u32,
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.resolved_endpoint(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaGenerate {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };
        let resp = self.client.post(&url).json(&body).send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(AiError::Service(format!("ollama returned {}: {}", status, text)));
        }
        let resp: OllamaGenerateResponse = resp.json()?;
        Ok(resp.response)
    }

    pub fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        self.client.get(&url).send().is_ok()
    }
}

impl CompletionService for OllamaClient {
    fn complete(&self, prompt: &str) -> Result<String, AiError> {
        self.generate(prompt)
    }

    fn name(&self) -> String {
        format!("ollama ({})", self.model)
    }

    fn is_available(&self) -> bool {
        OllamaClient::is_available(self)
    }
}

impl Embedder for OllamaClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, StoreError> {
        let url = format!("{}/api/embed", self.base_url);
        let body = OllamaEmbed {
            model: self.embed_model.clone(),
            input: text.to_string(),
        };
        let resp: OllamaEmbedResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .and_then(|r| r.json())
            .map_err(|e| StoreError::Embedding(e.to_string()))?;
        resp.embeddings
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Embedding("empty embedding response".into()))
    }
}
