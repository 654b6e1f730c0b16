// src/ct_log/types.rs
use serde::{Deserialize, Serialize};

/// Response from a CT log's `get-sth` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTreeHead {
    pub tree_size: u64,
    pub timestamp: u64,
    pub sha256_root_hash: String,
    #[serde(default)]
    pub tree_head_signature: String,
}

/// A single entry from a CT log's `get-entries` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub leaf_input: String,
    pub extra_data: String,
}

/// Response wrapper for the `get-entries` endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntriesResponse {
    pub entries: Vec<LogEntry>,
}

/// Google's CT log list v3 format.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogListV3 {
    pub operators: Vec<Operator>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(default)]
    pub email: Vec<String>,
    #[serde(default)]
    pub logs: Vec<LogInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogInfo {
    #[serde(default)]
    pub description: String,
    pub log_id: Option<String>,
    pub key: Option<String>,
    #[serde(default)]
    pub url: String,
    pub mmd: Option<u64>,
    #[serde(default)]
    pub state: Option<StateWrapper>,
}

/// State wrapper; only the `usable` variant matters to this crate (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateWrapper {
    #[serde(default)]
    pub usable: Option<serde_json::Value>,
    #[serde(default)]
    pub readonly: Option<serde_json::Value>,
    #[serde(default)]
    pub retired: Option<serde_json::Value>,
    #[serde(default)]
    pub rejected: Option<serde_json::Value>,
    #[serde(default)]
    pub qualified: Option<serde_json::Value>,
    #[serde(default)]
    pub pending: Option<serde_json::Value>,
}

impl StateWrapper {
    pub fn is_usable(&self) -> bool {
        self.usable.is_some()
    }
}
