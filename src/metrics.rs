use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub folios_issued: Arc<AtomicU64>,
    pub folio_batches: Arc<AtomicU64>,
    pub allocation_failures: Arc<AtomicU64>,
    pub audit_entries: Arc<AtomicU64>,
    pub audit_skipped: Arc<AtomicU64>,
    pub audit_failures: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            folios_issued: Arc::new(AtomicU64::new(0)),
            folio_batches: Arc::new(AtomicU64::new(0)),
            allocation_failures: Arc::new(AtomicU64::new(0)),
            audit_entries: Arc::new(AtomicU64::new(0)),
            audit_skipped: Arc::new(AtomicU64::new(0)),
            audit_failures: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn add_folios(&self, count: u64) {
        self.folios_issued.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_folio_batches(&self) {
        self.folio_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_allocation_failures(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_audit_entries(&self) {
        self.audit_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_audit_skipped(&self) {
        self.audit_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_audit_failures(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            folios_issued: self.folios_issued.load(Ordering::Relaxed),
            folio_batches: self.folio_batches.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            audit_entries: self.audit_entries.load(Ordering::Relaxed),
            audit_skipped: self.audit_skipped.load(Ordering::Relaxed),
            audit_failures: self.audit_failures.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub folios_issued: u64,
    pub folio_batches: u64,
    pub allocation_failures: u64,
    pub audit_entries: u64,
    pub audit_skipped: u64,
    pub audit_failures: u64,
    pub uptime_seconds: u64,
}
