use std::error::Error as StdError;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use thiserror::Error;

/// Why a remote feed could not be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL returns code: {0}")]
    Status(u16),

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Downloads the raw body behind a URL
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher sending a fixed User-Agent
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    fn classify(error: reqwest::Error) -> FetchError {
        if error.is_builder() {
            return FetchError::InvalidUrl(error.to_string());
        }

        let mut source: Option<&(dyn StdError + 'static)> = error.source();
        while let Some(cause) = source {
            let text = cause.to_string().to_lowercase();
            if ["certificate", "handshake", "ssl", "tls"].iter().any(|k| text.contains(k)) {
                return FetchError::Tls(cause.to_string());
            }
            source = cause.source();
        }
        FetchError::Transport(error.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(Self::classify)?;
        Ok(body.to_vec())
    }
}
