use crate::config::LlmConfig;
use crate::error::AiError;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;

/// A text-completion backend. The interpreter only needs prompt in, text out.
pub trait CompletionService {
    fn complete(&self, prompt: &str) -> Result<String, AiError>;

    fn name(&self) -> String {
        "completion service".to_string()
    }

    fn is_available(&self) -> bool {
        true
    }
}

impl<T: CompletionService + ?Sized> CompletionService for Box<T> {
    fn complete(&self, prompt: &str) -> Result<String, AiError> {
        (**self).complete(prompt)
    }

    fn name(&self) -> String {
        (**self).name()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}

pub fn build_completion_service(config: &LlmConfig) -> Box<dyn CompletionService> {
    match config.provider.as_str() {
        "openai" => Box::new(OpenAiClient::new(config)),
        _ => Box::new(OllamaClient::new(config)),
    }
}
