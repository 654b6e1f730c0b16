// src/ct_log/scheduler.rs
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::log_list::LogDirectory;
use super::poller::LogPoller;
use crate::record::Record;

/// Owns the fleet of [`LogPoller`] tasks, one per usable CT log.
pub struct PollScheduler {
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self { cancel_tx, cancel_rx, handles: Vec::new() }
    }

    /// Fetches the log list, caps it at `max_workers`, and launches one
    /// poller per descriptor. Records flow out through `tx`; the caller
    /// (the broker's publish loop) owns the receiving end.
    pub async fn start(
        &mut self,
        directory: &LogDirectory,
        tx: mpsc::Sender<Record>,
        max_workers: usize,
        batch_size: u64,
        poll_interval: Duration,
    ) {
        let mut logs = directory.list().await;
        if logs.is_empty() {
            warn!("log list is empty; no pollers started");
            return;
        }

        if logs.len() > max_workers {
            info!("capping {} usable logs to MAX_WORKERS={}", logs.len(), max_workers);
            logs.truncate(max_workers);
        }

        for descriptor in logs {
            let poller = LogPoller::new(descriptor.clone(), batch_size, poll_interval);
            let tx = tx.clone();
            let cancel_rx = self.cancel_rx.clone();
            info!("starting poller for {}", descriptor.name);
            self.handles.push(tokio::spawn(poller.run(tx, cancel_rx)));
        }
    }

    /// Signals cancellation to every poller and waits for them to drain.
    /// No poller is ever respawned, by design (§9).
    pub async fn stop(&mut self) {
        let _ = self.cancel_tx.send(true);
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}
