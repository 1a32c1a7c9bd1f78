use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Environment variable naming a config file or config name.
pub const MODEL_CONFIG_ENV: &str = "PARADOX_MODEL_CONFIG";

/// Default directory holding model config files.
pub const DEFAULT_MODELS_DIR: &str = "assets/models";

/// Config tried first when nothing else is specified.
pub const DEFAULT_MODEL_CONFIG: &str = "deepseek-chat.toml";

/// Connection settings for one OpenAI-compatible chat endpoint.
#[derive(Debug, Clone)]
pub struct ModelApiConfig {
    /// Provider label used in error messages (e.g. "deepseek").
    pub provider: String,
    /// Model identifier sent in the request payload.
    pub model: String,
    /// Base URL without the completions path.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout_seconds: f64,
    /// Path appended to `base_url`, always `/`-prefixed.
    pub chat_completions_path: String,
    /// Sampling temperature used when the caller does not override.
    pub default_temperature: f64,
    /// Extra request headers. Always carries a Content-Type.
    pub headers: BTreeMap<String, String>,
}

impl ModelApiConfig {
    /// Full chat-completions URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.chat_completions_path
        )
    }

    /// Loads and validates a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading model config {}", path.display()))?;
        let document: ModelApiConfigSerde =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;

        let provider = document.provider.trim().to_owned();
        let model = document.model.trim().to_owned();
        let base_url = document.base_url.trim().to_owned();
        if provider.is_empty() || model.is_empty() || base_url.is_empty() {
            bail!(
                "invalid config {}: provider, model, and base_url are required",
                path.display()
            );
        }

        let env_name = document.api_key_env.trim();
        let mut api_key = if env_name.is_empty() {
            String::new()
        } else {
            env::var(env_name).unwrap_or_default().trim().to_owned()
        };
        if api_key.is_empty() {
            api_key = document.api_key.trim().to_owned();
        }
        if api_key.is_empty() {
            let hint = if env_name.is_empty() {
                "api_key".to_owned()
            } else {
                format!("env {env_name}")
            };
            bail!("API key is empty for {}: set {hint}", path.display());
        }

        let mut chat_completions_path = document.chat_completions_path.trim().to_owned();
        if !chat_completions_path.starts_with('/') {
            chat_completions_path.insert(0, '/');
        }

        let mut headers: BTreeMap<String, String> = document
            .headers
            .into_iter()
            .filter_map(|(key, value)| {
                let key = key.trim().to_owned();
                let value = value.trim().to_owned();
                (!key.is_empty() && !value.is_empty()).then_some((key, value))
            })
            .collect();
        headers
            .entry("Content-Type".into())
            .or_insert_with(|| "application/json".into());

        Ok(Self {
            provider,
            model,
            base_url,
            api_key,
            timeout_seconds: document.timeout_seconds,
            chat_completions_path,
            default_temperature: document.default_temperature,
            headers,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ModelApiConfigSerde {
    #[serde(default)]
    provider: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    api_key_env: String,
    #[serde(default = "default_timeout")]
    timeout_seconds: f64,
    #[serde(default = "default_chat_path")]
    chat_completions_path: String,
    #[serde(default = "default_temperature")]
    default_temperature: f64,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

fn default_timeout() -> f64 {
    90.0
}

fn default_chat_path() -> String {
    "/chat/completions".into()
}

fn default_temperature() -> f64 {
    0.2
}

/// Names of config files under `models_dir`, sorted, `.toml` only.
#[must_use]
pub fn list_model_configs(models_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(models_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.ends_with(".toml").then_some(name)
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Resolves a config selector to a file path.
///
/// Order: explicit path → name under `models_dir` (`.toml` appended when
/// missing) → the `PARADOX_MODEL_CONFIG` env var (same rules) → the default
/// config name → the first config listed in the directory.
pub fn resolve_config_path(selector: Option<&str>, models_dir: Option<&Path>) -> Result<PathBuf> {
    let models_dir = models_dir.unwrap_or_else(|| Path::new(DEFAULT_MODELS_DIR));

    let env_value = env::var(MODEL_CONFIG_ENV).unwrap_or_default();
    let candidate = selector
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map_or_else(|| env_value.trim().to_owned(), str::to_owned);

    if !candidate.is_empty() {
        let raw = PathBuf::from(&candidate);
        if raw.is_file() {
            return Ok(raw);
        }
        let normalized = if candidate.ends_with(".toml") {
            candidate.clone()
        } else {
            format!("{candidate}.toml")
        };
        let named = models_dir.join(&normalized);
        if named.is_file() {
            return Ok(named);
        }
        let known = list_model_configs(models_dir);
        bail!(
            "model config not found: {candidate}. Try one of: {}",
            if known.is_empty() {
                "N/A".to_owned()
            } else {
                known.join(", ")
            }
        );
    }

    let default_path = models_dir.join(DEFAULT_MODEL_CONFIG);
    if default_path.is_file() {
        return Ok(default_path);
    }
    let known = list_model_configs(models_dir);
    match known.first() {
        Some(name) => Ok(models_dir.join(name)),
        None => bail!(
            "no model config found under {}; create one like {}/{}",
            models_dir.display(),
            models_dir.display(),
            DEFAULT_MODEL_CONFIG
        ),
    }
}

/// Resolves and loads in one step.
pub fn load_model_config(selector: Option<&str>, models_dir: Option<&Path>) -> Result<ModelApiConfig> {
    let path = resolve_config_path(selector, models_dir)?;
    ModelApiConfig::load(path)
}
