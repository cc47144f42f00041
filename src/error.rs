use thiserror::Error;

/// Failures of the completion path. Never returned from `Interpreter::interpret`;
/// they are folded into the interpretation's method and intent.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("{0}")]
    Service(String),

    #[error("could not parse model response: {reason}")]
    Parse { reason: String, raw: String },
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        AiError::Service(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Mismatched write: {documents} documents, {metadatas} metadatas, {ids} ids")]
    Mismatched {
        documents: usize,
        metadatas: usize,
        ids: usize,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
