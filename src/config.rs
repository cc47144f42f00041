use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

const APP_NAME: &str = "aixos";
const DEFAULT_MODEL: &str = "llama3.1";
const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub embed_model: String,
    /// Base URL of the provider. Unset means the provider's usual address.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model_path: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            model: DEFAULT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            endpoint: None,
            api_key: None,
            model_path: None,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

impl LlmConfig {
    /// The configured endpoint without a trailing slash, or the default
    /// address for `provider`.
    pub fn resolved_endpoint(&self) -> String {
        match self.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None if self.provider == "openai" => DEFAULT_OPENAI_URL.to_string(),
            None => DEFAULT_OLLAMA_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock budget per command, in seconds.
    pub command_timeout: u64,
    pub max_output_lines: usize,
    pub safe_mode: bool,
    pub shell: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout: 30,
            max_output_lines: 50,
            safe_mode: true,
            shell: "sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub vector_store_path: PathBuf,
    pub history_size: usize,
    /// `hash` for the offline embedder, `ollama` to use the embed model.
    pub embedder: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            vector_store_path: PathBuf::from("./data/vector_store"),
            history_size: 100,
            embedder: "hash".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub execution: ExecutionConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".into()));
        }
        if self.execution.command_timeout == 0 {
            return Err(ConfigError::Invalid("command_timeout must be positive".into()));
        }
        if self.execution.max_output_lines == 0 {
            return Err(ConfigError::Invalid("max_output_lines must be positive".into()));
        }
        if self.memory.history_size == 0 {
            return Err(ConfigError::Invalid("history_size must be positive".into()));
        }
        if !matches!(self.llm.provider.as_str(), "ollama" | "openai") {
            return Err(ConfigError::Invalid(format!(
                "unknown provider '{}'",
                self.llm.provider
            )));
        }
        Ok(())
    }

    /// Missing files yield the defaults. `.json` files are read as JSON,
    /// everything else as TOML.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = if is_json(path) {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load_from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Overlays values from `lookup` (normally the process environment) and
    /// re-validates.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("AI_MODEL_NAME") {
            self.llm.model = v;
        }
        if let Some(v) = lookup("AI_PROVIDER") {
            self.llm.provider = v.to_lowercase();
        }
        if let Some(v) = lookup("API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = lookup("API_BASE") {
            self.llm.endpoint = Some(v);
        }
        if let Some(v) = lookup("MODEL_PATH") {
            self.llm.model_path = Some(v);
        }
        if let Some(v) = lookup("MAX_TOKENS") {
            self.llm.max_tokens = parse_number("MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.llm.temperature = parse_number("TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("SAFE_MODE") {
            self.execution.safe_mode = parse_bool(&v);
        }
        if let Some(v) = lookup("COMMAND_TIMEOUT") {
            self.execution.command_timeout = parse_number("COMMAND_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("MAX_OUTPUT_LINES") {
            self.execution.max_output_lines = parse_number("MAX_OUTPUT_LINES", &v)?;
        }
        if let Some(v) = lookup("VECTOR_STORE_PATH") {
            self.memory.vector_store_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("HISTORY_SIZE") {
            self.memory.history_size = parse_number("HISTORY_SIZE", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v;
        }
        self.validate()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has a non-numeric value '{}'", key, value)))
}

pub fn get_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("config.toml")
}

/// Config file (or defaults) with environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let default_path = get_config_path();
    let mut config = Config::load_from_file(path.unwrap_or(&default_path))?;
    config.apply_env()?;
    Ok(config)
}

pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    config.save_to_file(&get_config_path())
}
