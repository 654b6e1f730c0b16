// src/ct_log/poller.rs
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::client::CtLogClient;
use super::decoder::{LeafDecoder, RawEntry};
use crate::record::{LogDescriptor, Record};

/// Drives a single CT log forward, emitting decoded [`Record`]s on `tx`.
///
/// Each `LogPoller` is the exclusive owner of its own `next_index` /
/// `tree_size` pair; pollers never share mutable state with one another.
pub struct LogPoller {
    descriptor: LogDescriptor,
    client: CtLogClient,
    batch_size: u64,
    poll_interval: Duration,
    next_index: u64,
    tree_size: u64,
}

impl LogPoller {
    pub fn new(
        descriptor: LogDescriptor,
        batch_size: u64,
        poll_interval: Duration,
    ) -> Self {
        let client = CtLogClient::new(descriptor.url.clone());
        Self { descriptor, client, batch_size, poll_interval, next_index: 0, tree_size: 0 }
    }

    /// Runs until `cancel` fires. Never returns an `Err`: a poller that
    /// hits an unrecoverable condition logs it and exits, it is not
    /// respawned by the scheduler.
    pub async fn run(mut self, tx: mpsc::Sender<Record>, mut cancel: watch::Receiver<bool>) {
        if !self.seed_tree_size(&mut cancel).await {
            return;
        }

        loop {
            if *cancel.borrow() {
                break;
            }

            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                result = self.poll_once(&tx) => {
                    if let Err(e) = result {
                        warn!("{}: poll error: {}", self.descriptor.name, e);
                    }
                    tokio::select! {
                        _ = cancel.changed() => {
                            if *cancel.borrow() {
                                break;
                            }
                        }
                        _ = sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        info!("{}: poller stopped", self.descriptor.name);
    }

    /// Issues the initial STH GET. Per design, `next_index` is set to the
    /// log's current tree size so that the first real poll only observes
    /// new entries going forward, never replaying the log's full history.
    async fn seed_tree_size(&mut self, cancel: &mut watch::Receiver<bool>) -> bool {
        loop {
            if *cancel.borrow() {
                return false;
            }
            match self.client.get_sth().await {
                Ok(sth) => {
                    self.tree_size = sth.tree_size;
                    self.next_index = sth.tree_size;
                    info!(
                        "{}: seeded at tree_size={}",
                        self.descriptor.name, self.tree_size
                    );
                    return true;
                }
                Err(e) => {
                    warn!("{}: initial STH fetch failed: {}", self.descriptor.name, e);
                    tokio::select! {
                        _ = cancel.changed() => {
                            if *cancel.borrow() {
                                return false;
                            }
                        }
                        _ = sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }

    async fn poll_once(&mut self, tx: &mpsc::Sender<Record>) -> anyhow::Result<()> {
        let sth = self.client.get_sth().await?;
        self.tree_size = sth.tree_size;

        if self.tree_size <= self.next_index {
            return Ok(());
        }

        let end = (self.tree_size - 1).min(self.next_index + self.batch_size - 1);
        let requested = end - self.next_index + 1;

        let response = self.client.get_entries(self.next_index, end).await?;
        let returned = response.entries.len() as u64;

        for (i, entry) in response.entries.iter().enumerate() {
            let idx = self.next_index + i as u64;
            let raw = RawEntry {
                leaf_input: entry.leaf_input.clone(),
                extra_data: entry.extra_data.clone(),
            };
            let seen_at = unix_seconds_now();

            match LeafDecoder::decode(&raw, &self.descriptor, idx, seen_at) {
                Some(record) => {
                    if tx.send(record).await.is_err() {
                        debug!("{}: broker channel closed, stopping", self.descriptor.name);
                        break;
                    }
                }
                None => {
                    debug!("{}: failed to decode entry {}", self.descriptor.name, idx);
                }
            }
        }

        // Advance by what the server actually returned; if fewer than
        // requested, the next poll picks up exactly where this left off.
        self.next_index += returned.min(requested);
        Ok(())
    }
}

fn unix_seconds_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
