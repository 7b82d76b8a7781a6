use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Shared HTTP client for remote pack files
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent("modpack-merger")
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch a URL fully into memory; any non-2xx status is an error
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()
            .with_context(|| format!("error status fetching {url}"))?;

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }
}
