//! Code-execution service client.
//!
//! Posts an [`ExecutionRequest`] to `{baseUrl}{endpoint}` with bearer
//! authentication and expects `{result, metadata}` back.

use super::retry::{with_retry, RetryPolicy};
use super::{credential, http_client, transport_error, ExecutionConnector, ExecutionRequest, ExecutionResponse};
use crate::config::{ConductorConfig, ExecutionConfig};
use crate::error::{ConductorError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const SERVICE: &str = "bolt";

/// HTTP client for the execution service.
#[derive(Debug, Clone)]
pub struct BoltClient {
    url: String,
    api_key: String,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl BoltClient {
    /// Create a client with an explicit key.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is blank or the HTTP client
    /// cannot be built.
    pub fn new(config: &ExecutionConfig, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConductorError::MissingCredential {
                env_var: config.api_key_env.clone(),
            });
        }
        Ok(Self {
            url: config.url(),
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
        let api_key = credential(&config.execution.api_key_env)?;
        Ok(Self::new(&config.execution, api_key, config.request_timeout())?
            .with_retry(RetryPolicy::from(&config.retry)))
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: &ExecutionRequest) -> Result<ExecutionResponse> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ConductorError::upstream_status(SERVICE, status.as_u16(), text));
        }

        response
            .json()
            .await
            .map_err(|e| ConductorError::upstream(SERVICE, format!("invalid response: {}", e), false))
    }
}

#[async_trait]
impl ExecutionConnector for BoltClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn execute(&self, request: &ExecutionRequest, cancel: &CancellationToken) -> Result<ExecutionResponse> {
        debug!(task_id = %request.task_id, url = %self.url, "Sending execution request");
        with_retry(SERVICE, &self.retry, cancel, |_| self.send(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_config() {
        let config = ExecutionConfig {
            base_url: "http://bolt.local/".into(),
            ..ExecutionConfig::default()
        };
        let client = BoltClient::new(&config, "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(), "http://bolt.local/api/execute");
    }

    #[test]
    fn test_blank_key_rejected() {
        let err = BoltClient::new(&ExecutionConfig::default(), "", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ConductorError::MissingCredential { ref env_var } if env_var == "BOLT_API_KEY"));
    }

    #[test]
    fn test_response_metadata_optional() {
        let response: ExecutionResponse = serde_json::from_str(r#"{"result": {"ok": true}}"#).unwrap();
        assert_eq!(response.result["ok"], true);
        assert!(response.metadata.is_null());
    }
}
