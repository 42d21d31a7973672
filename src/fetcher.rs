//! Resource fetching: retrieves raw image bytes over HTTP.

use crate::config::NetworkConfig;
use crate::error::{Error, FetchError};
use async_trait::async_trait;
use bytes::Bytes;

/// Abstraction over image retrieval, enabling testability.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the full body of `url`.
    ///
    /// # Errors
    ///
    /// Non-2xx responses surface as [`FetchError::HttpStatus`]; connection and
    /// body failures as [`FetchError::Transport`].
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError>;
}

/// Production [`ResourceFetcher`] backed by a shared `reqwest` client.
///
/// The client keeps a cookie jar so requests carry the credentials earlier
/// responses established, mirroring a credentialed browser fetch.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher from the network configuration.
    pub fn new(config: &NetworkConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response.bytes().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: format!("failed to read response body: {}", e),
        })
    }
}
