//! memgate_consent
//!
//! A process-local, TTL-bounded, consume-once gate: a caller who receives
//! a `NO_CONTEXT` response for a high-risk topic can ask a human to
//! `grant` it, then re-issue the same query once to get the sanitized
//! payload. A second re-issue always fails — this is deliberately not a
//! durable allowlist.

use memgate_common::normalize_key;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

pub struct ConsentGate {
    entries: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for ConsentGate {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ConsentGate {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    /// Insert or replace the entry for `topic` with an expiry of `now + ttl`.
    pub async fn grant(&self, topic: &str) {
        let key = normalize_key(topic);
        let expiry = Instant::now() + self.ttl;
        self.entries.lock().await.insert(key, expiry);
    }

    /// Erase any pending grant for `topic`, live or not.
    pub async fn deny(&self, topic: &str) {
        let key = normalize_key(topic);
        self.entries.lock().await.remove(&key);
    }

    /// Atomically remove the entry for `topic`, returning `true` only if
    /// it existed and had not yet expired. One-shot: a second call for the
    /// same topic returns `false` even if the first call succeeded.
    pub async fn consume(&self, topic: &str) -> bool {
        let key = normalize_key(topic);
        let mut entries = self.entries.lock().await;
        match entries.remove(&key) {
            Some(expiry) if expiry > Instant::now() => true,
            Some(_) => {
                tracing::debug!(topic = %key, "consent entry removed but had already expired");
                false
            }
            None => false,
        }
    }

    /// Non-consuming peek, used by telemetry/debugging surfaces.
    pub async fn is_pending(&self, topic: &str) -> bool {
        let key = normalize_key(topic);
        let entries = self.entries.lock().await;
        matches!(entries.get(&key), Some(expiry) if *expiry > Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn consume_is_one_shot() {
        let gate = ConsentGate::new(Duration::from_secs(60));
        gate.grant("refund policy").await;

        assert!(gate.consume("refund policy").await);
        assert!(!gate.consume("refund policy").await);
    }

    #[tokio::test]
    async fn deny_erases_pending_grant() {
        let gate = ConsentGate::new(Duration::from_secs(60));
        gate.grant("topic a").await;
        gate.deny("topic a").await;

        assert!(!gate.consume("topic a").await);
    }

    #[tokio::test]
    async fn topic_lookup_is_case_and_whitespace_insensitive() {
        let gate = ConsentGate::new(Duration::from_secs(60));
        gate.grant("  My Topic  ").await;

        assert!(gate.consume("my topic").await);
    }

    #[tokio::test]
    async fn expired_grant_cannot_be_consumed() {
        let gate = ConsentGate::new(Duration::from_millis(20));
        gate.grant("fast expiry").await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!gate.consume("fast expiry").await);
    }

    #[tokio::test]
    async fn is_pending_does_not_consume() {
        let gate = ConsentGate::new(Duration::from_secs(60));
        gate.grant("peekable").await;

        assert!(gate.is_pending("peekable").await);
        assert!(gate.is_pending("peekable").await);
        assert!(gate.consume("peekable").await);
    }
}
