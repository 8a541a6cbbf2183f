//! HTTP client for the evaluation backend.

use super::error::SourceError;
use super::loader::parse_document;
use crate::models::Evaluation;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{debug, info};

/// Placeholder substituted with the evaluation id in the path template.
const ID_PLACEHOLDER: &str = "{id}";

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Path template containing `{id}`.
    pub evaluation_path: String,
    pub timeout_seconds: u64,
    /// Maximum number of requests in flight.
    pub concurrency: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            evaluation_path: "/api/evaluations/{id}".to_string(),
            timeout_seconds: 30,
            concurrency: 4,
        }
    }
}

/// Fetches single evaluation documents from the backend.
pub struct EvaluationClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl EvaluationClient {
    /// Create a client for the configured backend.
    pub fn new(config: ClientConfig) -> Result<Self, SourceError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(SourceError::InvalidUrl {
                url: config.base_url.clone(),
                reason: "must start with 'http://' or 'https://'".to_string(),
            });
        }
        if !config.evaluation_path.contains(ID_PLACEHOLDER) {
            return Err(SourceError::InvalidUrl {
                url: config.evaluation_path.clone(),
                reason: format!("path template must contain {}", ID_PLACEHOLDER),
            });
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|source| SourceError::Http {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// URL of a single evaluation document.
    pub fn evaluation_url(&self, id: &str) -> String {
        let path = self.config.evaluation_path.replace(ID_PLACEHOLDER, id);
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Fetch one evaluation document.
    pub async fn fetch(&self, id: &str) -> Result<Evaluation, SourceError> {
        let url = self.evaluation_url(id);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|source| SourceError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { url, status });
        }

        let body = response.text().await.map_err(|source| SourceError::Http {
            url: url.clone(),
            source,
        })?;

        let evaluation = parse_document(&body, &url)?;
        info!("Fetched evaluation {}", evaluation.display_name());
        Ok(evaluation)
    }

    /// Fetch several evaluations concurrently, keeping the order of `ids`.
    pub async fn fetch_many(&self, ids: &[String]) -> Vec<Result<Evaluation, SourceError>> {
        stream::iter(ids)
            .map(|id| self.fetch(id))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }
}
