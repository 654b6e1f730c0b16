// src/broker.rs
//! Fan-out from decoded records to every connected view (§4.6).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use crate::buffer::CertBuffer;
use crate::metrics;
use crate::record::Record;
use crate::subscriber::{Subscriber, View};

/// Returned by [`FanOutBroker::attach`] when a view has reached
/// `MAX_CLIENTS_PER_ENDPOINT`.
pub const MAX_CLIENTS_REASON: &str = "Max clients reached";

#[derive(Default)]
struct ViewMembers {
    full: HashMap<u64, Arc<Subscriber>>,
    lite: HashMap<u64, Arc<Subscriber>>,
    domains_only: HashMap<u64, Arc<Subscriber>>,
}

impl ViewMembers {
    fn set_for(&mut self, view: View) -> &mut HashMap<u64, Arc<Subscriber>> {
        match view {
            View::Full => &mut self.full,
            View::Lite => &mut self.lite,
            View::DomainsOnly => &mut self.domains_only,
        }
    }

    fn set_for_ref(&self, view: View) -> &HashMap<u64, Arc<Subscriber>> {
        match view {
            View::Full => &self.full,
            View::Lite => &self.lite,
            View::DomainsOnly => &self.domains_only,
        }
    }
}

/// Snapshot of connected-client counts per view, used by `/stats`.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ClientCounts {
    pub full_stream: usize,
    pub lite_stream: usize,
    pub domains_only_stream: usize,
    pub total: usize,
}

/// Central fan-out point: the single entry point from pollers into the
/// buffer and every view's subscriber set. Membership is guarded by one
/// mutex; the buffer is guarded by its own. The two are never held
/// simultaneously.
pub struct FanOutBroker {
    buffer: Arc<CertBuffer>,
    members: Mutex<ViewMembers>,
    max_clients_per_endpoint: usize,
}

impl FanOutBroker {
    pub fn new(buffer: Arc<CertBuffer>, max_clients_per_endpoint: usize) -> Self {
        Self {
            buffer,
            members: Mutex::new(ViewMembers::default()),
            max_clients_per_endpoint,
        }
    }

    /// Publishes `record` to the buffer, then materializes and enqueues
    /// the JSON payload for each non-empty view exactly once.
    pub async fn publish(&self, record: Record) {
        self.buffer.add(record.clone()).await;
        metrics::record_processed();

        let members = self.members.lock().await;

        if !members.full.is_empty() {
            self.dispatch_view(members.set_for_ref(View::Full), &record, View::Full).await;
        }
        if !members.lite.is_empty() {
            let lite = record.to_lite();
            self.dispatch_view(members.set_for_ref(View::Lite), &lite, View::Lite).await;
        }
        if !members.domains_only.is_empty() {
            self.dispatch_domains_only(members.set_for_ref(View::DomainsOnly), &record).await;
        }
    }

    async fn dispatch_view(
        &self,
        subscribers: &HashMap<u64, Arc<Subscriber>>,
        record: &Record,
        view: View,
    ) {
        let envelope = match view {
            View::Full => record.full_envelope(),
            View::Lite => Record::lite_envelope(record),
            View::DomainsOnly => unreachable!("handled by dispatch_domains_only"),
        };
        let Ok(payload) = serde_json::to_string(&envelope) else {
            warn!("failed to serialize {:?} envelope", view);
            return;
        };
        let payload: Arc<str> = Arc::from(payload.as_str());
        for subscriber in subscribers.values() {
            if subscriber.enqueue(payload.clone()).await {
                metrics::record_dropped(view.as_str());
            }
        }
    }

    async fn dispatch_domains_only(
        &self,
        subscribers: &HashMap<u64, Arc<Subscriber>>,
        record: &Record,
    ) {
        let envelope = record.domains_only_envelope();
        let Ok(payload) = serde_json::to_string(&envelope) else {
            warn!("failed to serialize DOMAINS_ONLY envelope");
            return;
        };
        let payload: Arc<str> = Arc::from(payload.as_str());
        for subscriber in subscribers.values() {
            if subscriber.enqueue(payload.clone()).await {
                metrics::record_dropped(View::DomainsOnly.as_str());
            }
        }
    }

    /// Attempts to register `subscriber` under its view. Returns `Err`
    /// with the rejection reason if the view is already at capacity.
    pub async fn attach(&self, subscriber: Arc<Subscriber>) -> Result<(), &'static str> {
        let mut members = self.members.lock().await;
        let view = subscriber.view;
        let set = members.set_for(view);
        if set.len() >= self.max_clients_per_endpoint {
            return Err(MAX_CLIENTS_REASON);
        }
        set.insert(subscriber.id, subscriber);
        metrics::set_active_subscribers(view.as_str(), members.set_for_ref(view).len() as i64);
        Ok(())
    }

    pub async fn detach(&self, view: View, id: u64) {
        let mut members = self.members.lock().await;
        members.set_for(view).remove(&id);
        metrics::set_active_subscribers(view.as_str(), members.set_for_ref(view).len() as i64);
    }

    pub async fn client_counts(&self) -> ClientCounts {
        let members = self.members.lock().await;
        let full_stream = members.full.len();
        let lite_stream = members.lite.len();
        let domains_only_stream = members.domains_only.len();
        ClientCounts {
            full_stream,
            lite_stream,
            domains_only_stream,
            total: full_stream + lite_stream + domains_only_stream,
        }
    }

    pub fn buffer(&self) -> &Arc<CertBuffer> {
        &self.buffer
    }
}
