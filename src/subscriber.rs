// src/subscriber.rs
//! A single live WebSocket subscription (§4.7).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// The three rendering policies for a [`crate::record::Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Full,
    Lite,
    DomainsOnly,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Full => "full_stream",
            View::Lite => "lite_stream",
            View::DomainsOnly => "domains_only_stream",
        }
    }
}

#[derive(Deserialize)]
struct IncomingFrame {
    message_type: String,
}

#[derive(Serialize)]
struct PongFrame {
    message_type: &'static str,
}

/// A bounded, drop-oldest outbound queue plus the identity of one
/// connected client. `enqueue` never blocks: once the queue is at
/// capacity, the oldest pending message is discarded to make room for
/// the new one, so a slow subscriber can never stall a producer.
pub struct Subscriber {
    pub id: u64,
    pub view: View,
    queue: Mutex<VecDeque<Arc<str>>>,
    capacity: usize,
    notify: Notify,
    pub dropped: AtomicU64,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl Subscriber {
    pub fn new(view: View, queue_size: usize) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            view,
            queue: Mutex::new(VecDeque::with_capacity(queue_size)),
            capacity: queue_size,
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        })
    }

    /// Enqueues `payload`, returning `true` if doing so evicted the
    /// oldest pending message to stay within capacity.
    pub async fn enqueue(&self, payload: Arc<str>) -> bool {
        let dropped = {
            let mut queue = self.queue.lock().await;
            let dropped = queue.len() >= self.capacity;
            if dropped {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("subscriber {} queue full, dropped oldest", self.id);
            }
            queue.push_back(payload);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    #[cfg(test)]
    pub async fn dequeue_for_test(&self) -> Arc<str> {
        self.dequeue().await
    }

    async fn dequeue(&self) -> Arc<str> {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(payload) = queue.pop_front() {
                    return payload;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// Runs one accepted WebSocket connection end-to-end. The writer loop
/// drains the subscriber's queue (polling liveness every second); the
/// reader loop answers pings and refreshes the liveness clock. Either
/// side ending the connection triggers `on_close`, detaching the
/// subscriber from the broker.
pub async fn serve<F>(
    socket: WebSocket,
    subscriber: Arc<Subscriber>,
    ping_timeout: Duration,
    on_close: F,
) where
    F: FnOnce(u64) + Send + 'static,
{
    let (mut sink, mut stream) = socket.split();
    let last_ping_at = Arc::new(Mutex::new(tokio::time::Instant::now()));

    let writer_subscriber = subscriber.clone();
    let writer_last_ping = last_ping_at.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                payload = writer_subscriber.dequeue() => {
                    if sink.send(Message::Text(payload.to_string())).await.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    let elapsed = writer_last_ping.lock().await.elapsed();
                    if elapsed > ping_timeout {
                        debug!("subscriber {} liveness timeout, closing", writer_subscriber.id);
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        }
    });

    let reader_subscriber = subscriber.clone();
    let reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            if let Message::Text(text) = msg {
                if let Ok(frame) = serde_json::from_str::<IncomingFrame>(&text) {
                    if frame.message_type == "ping" {
                        *last_ping_at.lock().await = tokio::time::Instant::now();
                        let pong = serde_json::to_string(&PongFrame { message_type: "pong" })
                            .unwrap_or_default();
                        reader_subscriber.enqueue(Arc::from(pong.as_str())).await;
                    }
                }
            }
        }
    });

    let _ = tokio::join!(writer, reader);
    on_close(subscriber.id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_drops_oldest_beyond_capacity() {
        let subscriber = Subscriber::new(View::Full, 3);
        for i in 1..=5 {
            subscriber.enqueue(Arc::from(i.to_string().as_str())).await;
        }
        assert_eq!(subscriber.dropped.load(Ordering::Relaxed), 2);

        let mut seen = Vec::new();
        for _ in 0..3 {
            let v = subscriber.dequeue().await;
            seen.push(v.to_string());
        }
        assert_eq!(seen, vec!["3", "4", "5"]);
    }

    #[test]
    fn view_as_str_matches_stats_keys() {
        assert_eq!(View::Full.as_str(), "full_stream");
        assert_eq!(View::Lite.as_str(), "lite_stream");
        assert_eq!(View::DomainsOnly.as_str(), "domains_only_stream");
    }

    #[test]
    fn incoming_ping_frame_parses() {
        let frame: IncomingFrame = serde_json::from_str(r#"{"message_type":"ping"}"#).unwrap();
        assert_eq!(frame.message_type, "ping");
    }

    #[test]
    fn pong_frame_serializes_to_expected_shape() {
        let pong = serde_json::to_string(&PongFrame { message_type: "pong" }).unwrap();
        assert_eq!(pong, r#"{"message_type":"pong"}"#);
    }

    #[tokio::test]
    async fn enqueue_is_idempotent_under_capacity() {
        let subscriber = Subscriber::new(View::Lite, 5);
        subscriber.enqueue(Arc::from("a")).await;
        subscriber.enqueue(Arc::from("b")).await;
        assert_eq!(subscriber.dropped.load(Ordering::Relaxed), 0);
        assert_eq!(subscriber.dequeue().await.to_string(), "a");
        assert_eq!(subscriber.dequeue().await.to_string(), "b");
    }
}
