use crate::core::config::{ClientConfig, ConfigError};
use crate::core::errors::ClientError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::{instrument, trace};

/// Transport trait for fetching signed request URLs
///
/// Implementations perform a GET, decode the body as JSON and turn
/// `error_code` responses into [`ClientError::FacebookApi`]. Tests plug in
/// their own implementation to simulate the remote server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the decoded response
    ///
    /// # Returns
    /// Whatever JSON value the API returned (array, object or scalar)
    async fn fetch(&self, url: &str) -> Result<Value, ClientError>;
}

/// Configuration for the HTTP transport
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Request timeout in seconds; `None` waits forever
    pub timeout_seconds: Option<u64>,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl TransportConfig {
    pub fn from_client_config(config: &ClientConfig) -> Self {
        Self {
            timeout_seconds: config.timeout_seconds,
            user_agent: config.user_agent.clone(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from_client_config(&ClientConfig::default())
    }
}

/// Implementation of `Transport` using reqwest
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: TransportConfig,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Build a transport from the given configuration
    pub fn new(config: TransportConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(std::time::Duration::from_secs(timeout));
        }
        let client = builder.build().map_err(|e| {
            ConfigError::InvalidConfiguration(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client, config })
    }

    /// Read the body and decode it
    #[instrument(skip(self, response), fields(status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ClientError> {
        let response = response.error_for_status()?;
        let body = response.text().await?;

        trace!("Response body: {}", body);

        decode_body(&body)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, url), fields(url_len = url.len()))]
    async fn fetch(&self, url: &str) -> Result<Value, ClientError> {
        let response = self.client.get(url).send().await?;
        self.handle_response(response).await
    }
}

/// Decode a response body, surfacing API-level errors.
///
/// A JSON object carrying `error_code` becomes [`ClientError::FacebookApi`];
/// every other value is returned unchanged.
pub fn decode_body(body: &str) -> Result<Value, ClientError> {
    let value: Value = serde_json::from_str(body)?;

    if value.get("error_code").is_some() {
        return Err(ClientError::from_api_body(value));
    }
    Ok(value)
}
