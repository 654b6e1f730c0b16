// src/ct_log/client.rs
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::debug;

use super::types::{GetEntriesResponse, SignedTreeHead};

/// Thin RFC 6962 HTTP client for a single CT log.
///
/// Retries are the poller's responsibility (§4.3): a failed request here
/// simply returns `Err`, and the caller sleeps `POLL_INTERVAL` before
/// trying again without advancing its index.
pub struct CtLogClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl CtLogClient {
    pub fn new(base_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client");

        Self { base_url, http_client }
    }

    /// `GET {base_url}/ct/v1/get-sth`.
    pub async fn get_sth(&self) -> Result<SignedTreeHead> {
        let url = format!("{}/ct/v1/get-sth", self.base_url);
        debug!("Fetching STH from {}", url);

        let response = self.http_client.get(&url).send().await.context("Failed to fetch STH")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "STH request failed with status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        response.json().await.context("Failed to parse STH JSON")
    }

    /// `GET {base_url}/ct/v1/get-entries?start={start}&end={end}`.
    pub async fn get_entries(&self, start: u64, end: u64) -> Result<GetEntriesResponse> {
        let url = format!("{}/ct/v1/get-entries?start={}&end={}", self.base_url, start, end);
        debug!("Fetching entries {}-{} from {}", start, end, self.base_url);

        let response =
            self.http_client.get(&url).send().await.context("Failed to fetch entries")?;

        if !response.status().is_success() {
            anyhow::bail!(
                "get-entries request failed with status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            );
        }

        response.json().await.context("Failed to parse entries JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_sth_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tree_size": 42,
                "timestamp": 1000,
                "sha256_root_hash": "aaaa",
                "tree_head_signature": "bbbb"
            })))
            .mount(&server)
            .await;

        let client = CtLogClient::new(server.uri());
        let sth = client.get_sth().await.unwrap();
        assert_eq!(sth.tree_size, 42);
    }

    #[tokio::test]
    async fn get_sth_errors_on_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-sth"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = CtLogClient::new(server.uri());
        assert!(client.get_sth().await.is_err());
    }

    #[tokio::test]
    async fn get_entries_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ct/v1/get-entries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "entries": [{"leaf_input": "AAAA", "extra_data": "BBBB"}]
            })))
            .mount(&server)
            .await;

        let client = CtLogClient::new(server.uri());
        let entries = client.get_entries(0, 0).await.unwrap();
        assert_eq!(entries.entries.len(), 1);
    }
}
