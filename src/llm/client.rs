//! OpenAI-compatible chat-completions client

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use super::{ChatCompletionBody, ChatCompletionResponse, CompletionRequest, LlmError};
use crate::utils::config::AiConfig;
use crate::utils::errors::Errors;

/// Something that turns a prompt into text.
///
/// The haiku handler only depends on this trait so tests can substitute
/// their own implementations.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Client for `POST {base_url}/chat/completions`
pub struct ChatCompletionClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
}

// The credential is deliberately left out.
impl fmt::Debug for ChatCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ChatCompletionClient {
    /// Create a client from configuration, reading the credential from the
    /// environment.  Fails if the credential variable is unset.
    pub fn from_config(config: &AiConfig) -> Result<Self, Errors> {
        let api_key = config.get_api_key()?;
        Self::new(config, api_key)
    }

    /// Create a client with an explicit credential.
    pub fn new(config: &AiConfig, api_key: String) -> Result<Self, Errors> {
        debug!("ChatCompletionClient::new: model={} base_url={}", config.model, config.base_url);
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| Errors::HaikuError(format!("Unable to build HTTP client: {}", e)))?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!("complete: model={} max_tokens={}", self.model, request.max_tokens);
        let body = ChatCompletionBody::new(&self.model, &request);

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!("complete: API error {}", status);
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: ChatCompletionResponse = response.json().await?;
        api_response
            .first_text()
            .ok_or_else(|| LlmError::InvalidResponse("response contained no message content".to_string()))
    }
}
