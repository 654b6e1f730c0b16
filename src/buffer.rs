// src/buffer.rs
//! The sliding-window certificate buffer (§4.5).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::Mutex;

use crate::record::{BufferStats, Record};

/// Bounded, mutex-guarded ring buffer of the most recently published
/// records. All operations are serialized through a single mutex;
/// snapshots returned are value copies independent of the buffer.
pub struct CertBuffer {
    window: Mutex<VecDeque<Record>>,
    capacity: usize,
    total_processed: AtomicU64,
    started_at: Instant,
    started_at_unix: f64,
}

impl CertBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            total_processed: AtomicU64::new(0),
            started_at: Instant::now(),
            started_at_unix: unix_seconds_now(),
        }
    }

    /// Appends `record`, discarding the oldest entry if over capacity.
    pub async fn add(&self, record: Record) {
        let mut window = self.window.lock().await;
        if window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(record);
        self.total_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of up to `k` records (or all, if `None`), newest-first.
    pub async fn latest(&self, k: Option<usize>) -> Vec<Record> {
        let window = self.window.lock().await;
        let take = k.unwrap_or(window.len());
        window.iter().rev().take(take).cloned().collect()
    }

    /// The most recently added record, or `None` if the buffer is empty.
    pub async fn example(&self) -> Option<Record> {
        let window = self.window.lock().await;
        window.back().cloned()
    }

    pub async fn stats(&self) -> BufferStats {
        let size = self.window.lock().await.len();
        let total_processed = self.total_processed.load(Ordering::Relaxed);
        let uptime_s = self.started_at.elapsed().as_secs_f64();
        let rate_per_s = if uptime_s > 0.0 { total_processed as f64 / uptime_s } else { 0.0 };

        BufferStats {
            buffer_size: size,
            buffer_capacity: self.capacity,
            total_processed,
            uptime_s,
            rate_per_s,
            started_at: self.started_at_unix,
        }
    }
}

fn unix_seconds_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
