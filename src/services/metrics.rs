//! Process-wide request counters served at `/debug/vars`.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: Mutex<BTreeMap<u16, u64>>,
}

/// Cheap to clone; all clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct RequestMetrics {
    inner: Arc<Counters>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<u16, u64>,
}

impl RequestMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.inner.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, status: u16, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        self.inner.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.inner
            .processing_time_us
            .fetch_add(micros, Ordering::Relaxed);

        let mut by_status = self
            .inner
            .responses_by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *by_status.entry(status).or_default() += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let by_status = self
            .inner
            .responses_by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        MetricsSnapshot {
            total_requests_received: self.inner.requests_received.load(Ordering::Relaxed),
            total_responses_sent: self.inner.responses_sent.load(Ordering::Relaxed),
            total_processing_time_us: self.inner.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: by_status,
        }
    }
}
