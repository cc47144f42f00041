pub mod assistant;
pub mod commands;
pub mod config;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod interpreter;
pub mod llm;
pub mod memory;
pub mod ollama;
pub mod openai;
pub mod patterns;
pub mod safety;
pub mod types;
pub mod ui;
pub mod vector_store;
