// src/cli.rs
use clap::Parser;

/// ct-fanout: real-time Certificate Transparency aggregator and fan-out server.
///
/// Polls the public CT log ecosystem for newly logged certificates and
/// republishes them over HTTP and WebSocket in three views.
#[derive(Parser, Debug, Clone)]
#[command(name = "ct-fanout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file. Values there override the built-in
    /// defaults; CLI flags below override both.
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// HTTP/WebSocket bind host.
    #[arg(long = "host", env = "CT_FANOUT_HOST")]
    pub host: Option<String>,

    /// HTTP port. WebSocket views bind to PORT+1 (LITE), PORT+2 (FULL),
    /// PORT+3 (DOMAINS_ONLY).
    #[arg(short = 'p', long = "port", env = "CT_FANOUT_PORT")]
    pub port: Option<u16>,

    /// Google CT log list URL.
    #[arg(long = "log-list-url", env = "CT_FANOUT_LOG_LIST_URL")]
    pub log_list_url: Option<String>,

    /// Seconds between STH polls for each log.
    #[arg(long = "poll-interval-ms", env = "CT_FANOUT_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Maximum entries requested per get-entries call.
    #[arg(long = "batch-size", env = "CT_FANOUT_BATCH_SIZE")]
    pub batch_size: Option<u64>,

    /// Sliding window capacity of the in-memory certificate buffer.
    #[arg(long = "buffer-size", env = "CT_FANOUT_BUFFER_SIZE")]
    pub buffer_size: Option<usize>,

    /// Maximum concurrently monitored CT logs.
    #[arg(long = "max-workers", env = "CT_FANOUT_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Verbose logging (debug level).
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (warn level only).
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }
        Ok(())
    }

    pub fn log_level(&self) -> &str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_none() {
        let cli = Cli::parse_from(["ct-fanout"]);
        assert!(cli.config.is_none());
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_port_override() {
        let cli = Cli::parse_from(["ct-fanout", "--port", "9000"]);
        assert_eq!(cli.port, Some(9000));
    }

    #[test]
    fn test_verbose_and_quiet_invalid() {
        let cli = Cli::parse_from(["ct-fanout", "--verbose", "--quiet"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_log_level_default() {
        let cli = Cli::parse_from(["ct-fanout"]);
        assert_eq!(cli.log_level(), "info");
    }

    #[test]
    fn test_log_level_verbose() {
        let cli = Cli::parse_from(["ct-fanout", "--verbose"]);
        assert_eq!(cli.log_level(), "debug");
    }
}
