//! Delivery of stats reports to the collector

use crate::models::StatsReport;
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to send report: {0}")]
    Request(#[from] reqwest::Error),

    #[error("collector returned status {0}")]
    Status(u16),
}

/// Posts `StatsReport`s to the collector's ingest endpoint
pub struct StatsReporter {
    client: Client,
    endpoint: String,
}

impl StatsReporter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one report; any non-2xx answer is an error
    pub async fn send(&self, report: &StatsReport) -> Result<(), ReportError> {
        let response = self.client.post(&self.endpoint).json(report).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Status(status.as_u16()));
        }

        debug!(instance_id = %report.instance_id, status = status.as_u16(), "Report delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_send_posts_json() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/docker-stats")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJsonString(
                r#"{"instance_id":"h1","images_size_gb":2.5,"prune_action":false}"#.to_string(),
            ))
            .with_status(201)
            .with_body("ok\n")
            .create_async()
            .await;

        let reporter = StatsReporter::new(
            format!("{}/api/docker-stats", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        reporter
            .send(&StatsReport::measurement("h1", 2.5))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_non_success_is_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/docker-stats")
            .with_status(400)
            .create_async()
            .await;

        let reporter = StatsReporter::new(
            format!("{}/api/docker-stats", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();

        let err = reporter
            .send(&StatsReport::measurement("h1", 2.5))
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::Status(400)));
    }
}
