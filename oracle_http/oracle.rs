use anyhow::Result;
use async_trait::async_trait;
use paradox_engine::{OracleAnswer, OracleError, OracleQuestion, ReasoningOracle};

use crate::{
    client::ChatClient,
    config::ModelApiConfig,
    parse::{decode_answer, extract_json_object},
    prompts::{render_question, BASE_SYSTEM_PROMPT},
};

/// `ReasoningOracle` backed by an OpenAI-compatible chat endpoint. Holds no
/// conversational state; every query is a self-contained exchange.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: ChatClient,
    output_language: Option<String>,
}

impl HttpOracle {
    /// Builds an oracle from a loaded model config.
    pub fn new(config: ModelApiConfig) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
            output_language: None,
        })
    }

    /// Wraps an existing chat client.
    #[must_use]
    pub const fn from_client(client: ChatClient) -> Self {
        Self {
            client,
            output_language: None,
        }
    }

    /// Requests every free-text answer field in this language. The model
    /// decides how to honor it; structured keys stay English.
    #[must_use]
    pub fn with_output_language(mut self, language: Option<String>) -> Self {
        self.output_language = language.filter(|l| !l.trim().is_empty());
        self
    }

    /// The underlying chat client.
    #[must_use]
    pub const fn client(&self) -> &ChatClient {
        &self.client
    }
}

#[async_trait]
impl ReasoningOracle for HttpOracle {
    async fn query(&self, question: OracleQuestion) -> Result<OracleAnswer, OracleError> {
        let prompt = render_question(&question, self.output_language.as_deref());
        let raw = self.client.chat(BASE_SYSTEM_PROMPT, &prompt, None).await?;
        let value = extract_json_object(&raw)?;
        decode_answer(&question, value)
    }
}
