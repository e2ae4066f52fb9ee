//! API client for the collector

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the collector's HTTP API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid collector URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body.trim());
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a body-less POST with query parameters, returning the text reply
    pub async fn post_query(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let mut url = self.base_url.join(path).context("Invalid path")?;
        url.query_pairs_mut().extend_pairs(query);

        let response = self
            .client
            .post(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("API error ({}): {}", status, body.trim());
        }

        Ok(body)
    }
}

// API response types

/// One instance's latest report as listed by the collector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStats {
    pub instance_id: String,
    pub images_size_gb: f64,
    pub timestamp: String,
    pub prune_action: bool,
}
