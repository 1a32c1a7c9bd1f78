#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Reasoning oracle backed by an OpenAI-compatible chat-completions API.

/// Model API configuration loading (TOML).
#[path = "../config.rs"]
pub mod config;

/// HTTP chat-completions client.
#[path = "../client.rs"]
pub mod client;

/// Prompt templates for the pipeline's query kinds.
#[path = "../prompts.rs"]
pub mod prompts;

/// Tolerant JSON answer parsing and decoding.
#[path = "../parse.rs"]
pub mod parse;

/// The oracle implementation itself.
#[path = "../oracle.rs"]
pub mod oracle;

pub use client::ChatClient;
pub use config::{
    list_model_configs, load_model_config, resolve_config_path, ModelApiConfig,
    DEFAULT_MODELS_DIR, DEFAULT_MODEL_CONFIG, MODEL_CONFIG_ENV,
};
pub use oracle::HttpOracle;
pub use parse::{decode_answer, extract_json_object};
pub use prompts::{render_question, BASE_SYSTEM_PROMPT};
