use std::time::Duration;

use anyhow::{Context, Result};
use paradox_engine::OracleError;
use serde_json::json;

use crate::config::ModelApiConfig;

/// Thin client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    config: ModelApiConfig,
    http: reqwest::Client,
}

impl ChatClient {
    /// Builds a client from a loaded config.
    pub fn new(config: ModelApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout_seconds.max(1.0)))
            .build()
            .context("building http client")?;
        Ok(Self { config, http })
    }

    /// Provider label, for logging and error messages.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// Model identifier sent with every request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sends one system+user exchange and returns the assistant text.
    ///
    /// Timeouts map to `OracleError::Timeout`, transport and HTTP failures
    /// to `Unavailable`, and unexpected response shapes to `Malformed`.
    pub async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: Option<f64>,
    ) -> Result<String, OracleError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": temperature.unwrap_or(self.config.default_temperature),
        });

        let mut request = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&payload);
        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Unavailable(format!(
                    "{} request failed: {err}",
                    self.config.provider
                ))
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Unavailable(format!(
                    "{} response read failed: {err}",
                    self.config.provider
                ))
            }
        })?;
        if !status.is_success() {
            return Err(OracleError::Unavailable(format!(
                "{} request failed with HTTP {status}: {body}",
                self.config.provider
            )));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            OracleError::Malformed(format!(
                "{} response is not JSON: {body}",
                self.config.provider
            ))
        })?;
        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_owned())
            .ok_or_else(|| {
                OracleError::Malformed(format!(
                    "{} response is not in chat-completions shape: {body}",
                    self.config.provider
                ))
            })
    }
}
