// src/utils/http.rs

//! Document fetching.
//!
//! The engine never builds requests itself; it asks a [`DocumentFetcher`]
//! for a page and gets back a [`RawDocument`] that either carries the
//! markup or the reason the fetch failed.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::{FetcherConfig, RawDocument};

/// Retrieves raw markup for a source page.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch one page. Failures are reported in the returned document's
    /// outcome, never as a panic or error.
    async fn fetch(&self, source_id: &str, page_index: u32, url: &str) -> RawDocument;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FetcherConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::config(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::config(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// [`DocumentFetcher`] backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_text(&self, url: &str) -> Result<(u16, String)> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP {status}")));
        }
        Ok((status.as_u16(), response.text().await?))
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, source_id: &str, page_index: u32, url: &str) -> RawDocument {
        match self.fetch_text(url).await {
            Ok((status, body)) => {
                log::debug!("Fetched {url} ({status}, {} bytes)", body.len());
                RawDocument::success(source_id, page_index, url, body).with_status(status)
            }
            Err(e) => {
                log::warn!("Failed to fetch {url}: {e}");
                RawDocument::failed(source_id, page_index, url, e.to_string())
            }
        }
    }
}
