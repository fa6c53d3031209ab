//! Upstream chat completions client.
//!
//! Every relay request becomes one streaming `POST` to the configured
//! OpenAI-compatible endpoint: a fixed system instruction followed by the
//! caller's prompt, passed through untouched.

use crate::{config::RelayConfig, error::RelayError};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,

    /// Omitted entirely when the caller sent no prompt; an explicit `null`
    /// is forwarded as `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, prompt: Option<Value>) -> Self {
        Self {
            model: model.into(),
            stream: true,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(Value::String(SYSTEM_PROMPT.to_string())),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt,
                },
            ],
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
    url: String,
    model: String,
}

impl UpstreamClient {
    pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth: reqwest::header::HeaderValue =
            format!("Bearer {}", config.api_key.expose_secret())
                .parse()
                .map_err(|_| RelayError::Configuration("invalid API key format".into()))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let mut builder = Client::builder().default_headers(headers);
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            url: config.upstream_url.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Open the streaming completion request.
    ///
    /// Only a successful status is returned; anything else is read to text
    /// for the log and reported as [`RelayError::UpstreamStatus`].
    pub async fn open_stream(&self, prompt: Option<Value>) -> Result<reqwest::Response, RelayError> {
        let request = ChatCompletionRequest::new(self.model.clone(), prompt);

        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "Groq API error");
            return Err(RelayError::UpstreamStatus { status, body });
        }

        Ok(response)
    }
}
