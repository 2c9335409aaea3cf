//! Anthropic Messages API client.
//!
//! Sends a single user message to `POST {baseUrl}/v1/messages` and returns
//! the concatenated text blocks. Transient failures are retried with the
//! configured backoff; the API key is read from the environment when the
//! client is built, so a missing key fails at construction.

use super::retry::{with_retry, RetryPolicy};
use super::{credential, http_client, transport_error, Generation, GenerationRequest, TokenUsage, ToolConnector};
use crate::config::{AnthropicConfig, ConductorConfig};
use crate::error::{ConductorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SERVICE: &str = "anthropic";

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Chat-completion client for the Anthropic API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    name: String,
    config: AnthropicConfig,
    api_key: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Create a client with an explicit key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is blank or the HTTP client
    /// cannot be built.
    pub fn new(config: AnthropicConfig, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConductorError::MissingCredential {
                env_var: config.api_key_env.clone(),
            });
        }
        Ok(Self {
            name: "claude".to_string(),
            config,
            api_key,
            retry: RetryPolicy::default(),
            client: http_client(timeout)?,
        })
    }

    /// Create a client from conductor settings, reading the key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConductorError::MissingCredential`] if the key variable is unset.
    pub fn from_config(config: &ConductorConfig) -> Result<Self> {
        let api_key = credential(&config.anthropic.api_key_env)?;
        Ok(Self::new(config.anthropic.clone(), api_key, config.request_timeout())?
            .with_retry(RetryPolicy::from(&config.retry)))
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the tool name reported by this client.
    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    fn api_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn body<'a>(&'a self, request: &'a GenerationRequest) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens.min(self.config.max_tokens),
            temperature: request.temperature,
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        }
    }

    async fn send(&self, body: &MessagesRequest<'_>) -> Result<Generation> {
        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConductorError::upstream_status(SERVICE, status.as_u16(), text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ConductorError::upstream(SERVICE, format!("invalid response: {}", e), false))?;
        Ok(parsed.into_generation())
    }
}

#[async_trait]
impl ToolConnector for AnthropicClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest, cancel: &CancellationToken) -> Result<Generation> {
        let body = self.body(request);
        debug!(model = %self.config.model, prompt_chars = request.prompt.len(), "Sending messages request");
        let generation = with_retry(SERVICE, &self.retry, cancel, |_| self.send(&body)).await?;
        debug!(
            input_tokens = generation.usage.input_tokens,
            output_tokens = generation.usage.output_tokens,
            "Received messages response"
        );
        Ok(generation)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: UsageBlock,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct UsageBlock {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl MessagesResponse {
    fn into_generation(self) -> Generation {
        let text = self
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        Generation {
            text,
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
            model: self.model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_is_missing_credential() {
        let err = AnthropicClient::new(AnthropicConfig::default(), "  ", Duration::from_secs(1)).unwrap_err();
        match err {
            ConductorError::MissingCredential { env_var } => assert_eq!(env_var, "ANTHROPIC_API_KEY"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let client = AnthropicClient::new(AnthropicConfig::default(), "key", Duration::from_secs(1)).unwrap();
        let request = GenerationRequest::new("Build a form").with_max_tokens(10_000);
        let json = serde_json::to_value(client.body(&request)).unwrap();

        assert_eq!(json["model"], AnthropicConfig::default().model);
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Build a form");
    }

    #[test]
    fn test_api_url_trims_slash() {
        let config = AnthropicConfig {
            base_url: "http://localhost:8080/".into(),
            ..AnthropicConfig::default()
        };
        let client = AnthropicClient::new(config, "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.api_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_response_parsing_joins_text_blocks() {
        let json = r#"{
            "model": "claude-test",
            "content": [
                {"type": "text", "text": "Here it is:"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "```ts\nconst a = 1;\n```"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 34}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(json).unwrap();
        let generation = parsed.into_generation();
        assert_eq!(generation.text, "Here it is:\n```ts\nconst a = 1;\n```");
        assert_eq!(generation.usage.total(), 46);
        assert_eq!(generation.model, "claude-test");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_retried_then_exhausted() {
        let config = AnthropicConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..AnthropicConfig::default()
        };
        let client = AnthropicClient::new(config, "key", Duration::from_secs(2))
            .unwrap()
            .with_retry(RetryPolicy::immediate(2));
        let err = client
            .generate(&GenerationRequest::new("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConductorError::RetriesExhausted { attempts: 2, .. }));
    }
}
