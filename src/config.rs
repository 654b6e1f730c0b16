// src/config.rs
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::cli::Cli;

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_log_list_url() -> String {
    "https://www.gstatic.com/ct/log_list/v3/log_list.json".to_string()
}
fn default_poll_interval_ms() -> u64 {
    10_000
}
fn default_batch_size() -> u64 {
    256
}
fn default_buffer_size() -> usize {
    25
}
fn default_client_ping_timeout_ms() -> u64 {
    60_000
}
fn default_max_clients_per_endpoint() -> usize {
    1_000
}
fn default_client_queue_size() -> usize {
    100
}
fn default_max_workers() -> usize {
    50
}

/// Process-wide configuration (§6). Every field has a spec default;
/// a TOML file may override any subset, and CLI flags (with env-var
/// fallback) take precedence over both.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_list_url")]
    pub log_list_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_client_ping_timeout_ms")]
    pub client_ping_timeout_ms: u64,
    #[serde(default = "default_max_clients_per_endpoint")]
    pub max_clients_per_endpoint: usize,
    #[serde(default = "default_client_queue_size")]
    pub client_queue_size: usize,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_list_url: default_log_list_url(),
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            buffer_size: default_buffer_size(),
            client_ping_timeout_ms: default_client_ping_timeout_ms(),
            max_clients_per_endpoint: default_max_clients_per_endpoint(),
            client_queue_size: default_client_queue_size(),
            max_workers: default_max_workers(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&contents)?;
        Ok(cfg)
    }

    /// Loads from `cli.config` if present (falling back to defaults if
    /// absent), then applies every CLI/env override on top.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Self::default(),
        };

        if let Some(ref host) = cli.host {
            config.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(ref url) = cli.log_list_url {
            config.log_list_url = url.clone();
        }
        if let Some(ms) = cli.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(n) = cli.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = cli.buffer_size {
            config.buffer_size = n;
        }
        if let Some(n) = cli.max_workers {
            config.max_workers = n;
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn client_ping_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.client_ping_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_matches_spec_constants() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.poll_interval_ms, 10_000);
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.buffer_size, 25);
        assert_eq!(config.client_ping_timeout_ms, 60_000);
        assert_eq!(config.max_clients_per_endpoint, 1_000);
        assert_eq!(config.client_queue_size, 100);
        assert_eq!(config.max_workers, 50);
    }

    #[test]
    fn from_file_partial_override_keeps_other_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "port = 9000\nbatch_size = 512\n").unwrap();
        file.flush().unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.batch_size, 512);
        assert_eq!(config.buffer_size, 25);
    }

    #[test]
    fn from_file_rejects_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not valid toml {{{{").unwrap();
        file.flush().unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let cli = Cli {
            config: None,
            host: None,
            port: Some(7000),
            log_list_url: None,
            poll_interval_ms: None,
            batch_size: None,
            buffer_size: Some(5),
            max_workers: None,
            verbose: false,
            quiet: false,
        };

        let config = Config::load(&cli).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.buffer_size, 5);
        assert_eq!(config.batch_size, 256);
    }
}
