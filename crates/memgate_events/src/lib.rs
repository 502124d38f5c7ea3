//! memgate_events
//!
//! An in-process telemetry bus: a bounded ring of recent events plus a
//! fan-out subscriber set. Mirrors the append-and-broadcast discipline the
//! workspace uses elsewhere for auditability, without the hash-chaining a
//! tamper-evident log would need — this stream is observability, not a
//! signed record.

mod stats;

pub use stats::{StatsCollector, StatsSnapshot};

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_RING_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    QueryReceived,
    PrivacyProcessed,
    RiskBlocked,
    ConsentRequired,
    ConsentDecision,
    IngestSuccess,
    IngestError,
    ArchestraRequest,
    ArchestraResponse,
    MemorySaved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub ts: chrono::DateTime<chrono::Utc>,
    pub payload: serde_json::Value,
}

type Handler = dyn Fn(&TelemetryEvent) + Send + Sync;

struct Subscriber {
    id: u64,
    handler: Arc<Handler>,
}

struct EventBusInner {
    ring: Mutex<VecDeque<TelemetryEvent>>,
    capacity: usize,
    next_sub_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

#[derive(Clone)]
pub struct EventBus(Arc<EventBusInner>);

pub struct Subscription {
    bus: Arc<EventBusInner>,
    id: u64,
}

impl Subscription {
    pub async fn unsubscribe(self) {
        let mut subs = self.bus.subscribers.lock().await;
        subs.retain(|s| s.id != self.id);
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self(Arc::new(EventBusInner {
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            next_sub_id: AtomicU64::new(0),
            subscribers: Mutex::new(Vec::new()),
        }))
    }

    pub async fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TelemetryEvent) + Send + Sync + 'static,
    {
        let id = self.0.next_sub_id.fetch_add(1, Ordering::SeqCst);
        let sub = Subscriber { id, handler: Arc::new(handler) };
        let bus = self.0.clone();
        bus.subscribers.lock().await.push(sub);
        Subscription { bus, id }
    }

    pub async fn publish(&self, kind: EventKind, payload: serde_json::Value) -> TelemetryEvent {
        let event = TelemetryEvent { id: Uuid::new_v4(), kind, ts: chrono::Utc::now(), payload };

        {
            let mut ring = self.0.ring.lock().await;
            ring.push_back(event.clone());
            while ring.len() > self.0.capacity {
                ring.pop_front();
            }
        }

        let handlers: Vec<Arc<Handler>> = {
            let subs = self.0.subscribers.lock().await;
            subs.iter().map(|s| s.handler.clone()).collect()
        };
        for handler in handlers {
            let event_ref = &event;
            if std::panic::catch_unwind(AssertUnwindSafe(|| handler(event_ref))).is_err() {
                tracing::warn!("telemetry subscriber panicked, continuing");
            }
        }

        event
    }

    pub async fn recent(&self, limit: usize) -> Vec<TelemetryEvent> {
        let ring = self.0.ring.lock().await;
        ring.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn publish_appends_and_evicts_oldest_on_overflow() {
        let bus = EventBus::new(2);
        bus.publish(EventKind::QueryReceived, json!({"n": 1})).await;
        bus.publish(EventKind::QueryReceived, json!({"n": 2})).await;
        bus.publish(EventKind::QueryReceived, json!({"n": 3})).await;

        let recent = bus.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].payload, json!({"n": 3}));
        assert_eq!(recent[1].payload, json!({"n": 2}));
    }

    #[tokio::test]
    async fn subscriber_panic_does_not_break_publish_or_other_subscribers() {
        let bus = EventBus::new(DEFAULT_RING_CAPACITY);
        let other_calls = Arc::new(AtomicUsize::new(0));
        let other_calls2 = other_calls.clone();

        bus.subscribe(|_event| panic!("broken subscriber")).await;
        bus.subscribe(move |_event| {
            other_calls2.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        bus.publish(EventKind::QueryReceived, json!({})).await;
        assert_eq!(other_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new(DEFAULT_RING_CAPACITY);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let subscription = bus
            .subscribe(move |_event| {
                calls2.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        bus.publish(EventKind::QueryReceived, json!({})).await;
        subscription.unsubscribe().await;
        bus.publish(EventKind::QueryReceived, json!({})).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
