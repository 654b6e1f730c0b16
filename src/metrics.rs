// src/metrics.rs
//! Internal Prometheus metrics.
//!
//! There is no separate scrape endpoint: the counters and gauges here
//! are read back into a JSON-friendly [`MetricsSnapshot`] and folded
//! into `/stats` by `server::http`. The registry still exists because
//! it is the idiomatic place to keep these metrics registered and
//! gatherable, should a scrape endpoint ever be wired up.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total records successfully decoded and published to the buffer.
    pub static ref RECORDS_PROCESSED_TOTAL: IntCounter = IntCounter::new(
        "ctfanout_records_processed_total",
        "Total number of certificate records decoded and published"
    ).expect("metric cannot be created");

    /// Queue drops, labeled by view ("full_stream" | "lite_stream" | "domains_only_stream").
    pub static ref DROPS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("ctfanout_subscriber_drops_total", "Total messages dropped from a subscriber's outbound queue"),
        &["view"]
    ).expect("metric cannot be created");

    /// Currently connected subscribers, labeled by view.
    pub static ref ACTIVE_SUBSCRIBERS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("ctfanout_active_subscribers", "Currently connected WebSocket subscribers"),
        &["view"]
    ).expect("metric cannot be created");
}

/// Registers every metric above with [`REGISTRY`]. Safe to call more
/// than once; a duplicate registration just returns an error that the
/// caller can ignore.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(RECORDS_PROCESSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DROPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_SUBSCRIBERS.clone()))?;
    Ok(())
}

pub fn record_processed() {
    RECORDS_PROCESSED_TOTAL.inc();
}

pub fn record_dropped(view: &str) {
    DROPS_TOTAL.with_label_values(&[view]).inc();
}

pub fn set_active_subscribers(view: &str, count: i64) {
    ACTIVE_SUBSCRIBERS.with_label_values(&[view]).set(count);
}

/// A point-in-time read of the counters above, shaped for `/stats`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub records_processed_total: u64,
    pub drops_total: ViewCounts,
    pub active_subscribers: ViewCounts,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ViewCounts {
    pub full_stream: i64,
    pub lite_stream: i64,
    pub domains_only_stream: i64,
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        records_processed_total: RECORDS_PROCESSED_TOTAL.get(),
        drops_total: ViewCounts {
            full_stream: DROPS_TOTAL.with_label_values(&["full_stream"]).get() as i64,
            lite_stream: DROPS_TOTAL.with_label_values(&["lite_stream"]).get() as i64,
            domains_only_stream: DROPS_TOTAL.with_label_values(&["domains_only_stream"]).get() as i64,
        },
        active_subscribers: ViewCounts {
            full_stream: ACTIVE_SUBSCRIBERS.with_label_values(&["full_stream"]).get(),
            lite_stream: ACTIVE_SUBSCRIBERS.with_label_values(&["lite_stream"]).get(),
            domains_only_stream: ACTIVE_SUBSCRIBERS.with_label_values(&["domains_only_stream"]).get(),
        },
    }
}
