//! Shared operational state: process-wide counters and the app state the
//! HTTP surface reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use vitalwatch_engine::StateStore;

/// Process-wide tallies, atomically incremented by concurrent handlers.
#[derive(Debug, Default)]
pub struct Counters {
    /// Messages delivered by the subscription.
    pub received: AtomicU64,
    /// Messages that passed parse + schema validation.
    pub validated: AtomicU64,
    /// Alerts successfully published downstream.
    pub alerts_published: AtomicU64,
    /// Messages terminally dropped as unparseable or schema-invalid.
    pub dropped_invalid: AtomicU64,
    /// Alerts whose publish failed (nak'd for redelivery).
    pub dropped_publish_fail: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            received: self.received.load(Ordering::Relaxed),
            validated: self.validated.load(Ordering::Relaxed),
            alerts_published: self.alerts_published.load(Ordering::Relaxed),
            dropped_invalid: self.dropped_invalid.load(Ordering::Relaxed),
            dropped_publish_fail: self.dropped_publish_fail.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of the counters for API responses.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CountersSnapshot {
    pub received: u64,
    pub validated: u64,
    pub alerts_published: u64,
    pub dropped_invalid: u64,
    pub dropped_publish_fail: u64,
}

/// State shared between the pipeline and the HTTP surface.
pub struct AppState {
    pub counters: Arc<Counters>,
    pub store: Arc<StateStore>,
    /// Whether the durable subscription is currently live.
    pub connected: AtomicBool,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(counters: Arc<Counters>, store: Arc<StateStore>) -> Self {
        Self {
            counters,
            store,
            connected: AtomicBool::new(false),
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::new();
        counters.received.fetch_add(3, Ordering::Relaxed);
        counters.dropped_invalid.fetch_add(1, Ordering::Relaxed);

        let snap = counters.snapshot();
        assert_eq!(snap.received, 3);
        assert_eq!(snap.dropped_invalid, 1);
        assert_eq!(snap.alerts_published, 0);
    }
}
