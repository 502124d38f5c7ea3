//! A single subscriber that turns the telemetry stream into persisted
//! counters. All file writes funnel through one spawned task reading from
//! an unbounded channel, so concurrent events never interleave a write —
//! the async equivalent of the chained-promise writer the teacher repo
//! uses for serialized JSON rewrites.

use crate::{EventBus, EventKind, Subscription, TelemetryEvent};
use memgate_common::canonical_json_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_queries: u64,
    pub blocked_high_risk: u64,
    pub total_redactions: u64,
    pub ingested_files: u64,
    pub ingested_chunks: u64,
    pub ingest_errors: u64,
    pub per_category_redactions: HashMap<String, u64>,
}

pub struct StatsCollector {
    state: Arc<Mutex<StatsSnapshot>>,
}

impl StatsCollector {
    /// Subscribe to `bus` and spawn the single writer task. Returns the
    /// collector (for reads) and the subscription (drop/`unsubscribe` to
    /// stop listening).
    pub async fn attach(bus: &EventBus, persist_path: Option<PathBuf>) -> (Self, Subscription) {
        let state = Arc::new(Mutex::new(StatsSnapshot::default()));
        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetryEvent>();

        let writer_state = state.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let mut snapshot = writer_state.lock().await;
                apply_event(&mut snapshot, &event);
                if let Some(path) = &persist_path {
                    match canonical_json_bytes(&*snapshot) {
                        Ok(bytes) => {
                            if let Err(e) = std::fs::write(path, bytes) {
                                tracing::warn!(error = %e, "stats snapshot persist failed (non-fatal)");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "stats snapshot serialization failed (non-fatal)"),
                    }
                }
            }
        });

        let subscription = bus
            .subscribe(move |event| {
                let _ = tx.send(event.clone());
            })
            .await;

        (Self { state }, subscription)
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.state.lock().await.clone()
    }
}

fn apply_event(snapshot: &mut StatsSnapshot, event: &TelemetryEvent) {
    match event.kind {
        EventKind::QueryReceived => snapshot.total_queries += 1,
        EventKind::RiskBlocked => {
            if event.payload.get("reason").and_then(|v| v.as_str()) == Some("high-risk") {
                snapshot.blocked_high_risk += 1;
            }
        }
        EventKind::PrivacyProcessed => {
            let count = event.payload.get("redaction_count").and_then(|v| v.as_u64()).unwrap_or(0);
            snapshot.total_redactions += count;
            if let Some(cleaned) = event.payload.get("cleaned_text").and_then(|v| v.as_str()) {
                for tag in redaction_placeholders(cleaned) {
                    *snapshot.per_category_redactions.entry(tag).or_insert(0) += 1;
                }
            }
        }
        EventKind::IngestSuccess => {
            snapshot.ingested_files += 1;
            snapshot.ingested_chunks += event.payload.get("chunks").and_then(|v| v.as_u64()).unwrap_or(0);
        }
        EventKind::IngestError => snapshot.ingest_errors += 1,
        _ => {}
    }
}

/// Scan `text` for `[REDACTED_*]` placeholders, returning the category
/// name (`"phone"`, `"email"`, ...) each one stands for.
fn redaction_placeholders(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("[REDACTED_") {
        let after_start = &rest[start..];
        if let Some(end) = after_start.find(']') {
            let tag = &after_start[1..end];
            if let Some(category) = tag.strip_prefix("REDACTED_") {
                out.push(category.to_lowercase());
            }
            rest = &after_start[end + 1..];
        } else {
            break;
        }
    }
    out
}
