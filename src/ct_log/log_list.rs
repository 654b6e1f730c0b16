// src/ct_log/log_list.rs
use std::time::Duration;
use tracing::{debug, error, info};

use super::types::LogListV3;
use crate::record::LogDescriptor;

/// Fetches and filters Google's CT log list (§4.1).
pub struct LogDirectory {
    http_client: reqwest::Client,
    list_url: String,
}

impl LogDirectory {
    pub fn new(list_url: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client");

        Self { http_client, list_url: list_url.into() }
    }

    /// Fetches the master log list and returns only logs whose
    /// `state.usable` key is present, in the order received.
    ///
    /// A non-200 response or a network/decode failure yields an empty
    /// sequence; the caller treats this as a terminal startup error.
    pub async fn list(&self) -> Vec<LogDescriptor> {
        match self.try_list().await {
            Ok(logs) => logs,
            Err(e) => {
                error!("Failed to fetch CT log list from {}: {}", self.list_url, e);
                Vec::new()
            }
        }
    }

    async fn try_list(&self) -> anyhow::Result<Vec<LogDescriptor>> {
        info!("Fetching CT log list from {}", self.list_url);

        let response = self.http_client.get(&self.list_url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("log list request failed with status {}", response.status());
        }

        let log_list: LogListV3 = response.json().await?;

        let mut usable = Vec::new();
        for operator in &log_list.operators {
            for log in &operator.logs {
                if log.url.is_empty() {
                    continue;
                }
                let is_usable = log.state.as_ref().is_some_and(|s| s.is_usable());
                if is_usable {
                    debug!("Usable log: {} ({})", log.description, log.url);
                    usable.push(LogDescriptor::new(log.url.clone(), log.description.clone()));
                }
            }
        }

        info!("Found {} usable CT logs", usable.len());
        Ok(usable)
    }
}
