// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Events read from and appended to streams
// - Optimistic concurrency conflicts
// - State cache hits and misses
// - Throttling retries and request latency
//
// Every context owns one registry, scraped via /metrics
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub events_read: IntCounter,
    pub events_appended: IntCounter,
    pub sync_conflicts: IntCounter,
    pub cache_requests: IntCounterVec,
    pub retry_attempts: IntCounterVec,
    pub request_duration: HistogramVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_read = IntCounter::new("store_events_read_total", "Total events read from streams")?;
        registry.register(Box::new(events_read.clone()))?;

        let events_appended =
            IntCounter::new("store_events_appended_total", "Total events appended to streams")?;
        registry.register(Box::new(events_appended.clone()))?;

        let sync_conflicts = IntCounter::new(
            "store_sync_conflicts_total",
            "Appends rejected because the stream moved on",
        )?;
        registry.register(Box::new(sync_conflicts.clone()))?;

        let cache_requests = IntCounterVec::new(
            Opts::new("store_cache_requests_total", "State cache lookups"),
            &["result"],
        )?;
        registry.register(Box::new(cache_requests.clone()))?;

        let retry_attempts = IntCounterVec::new(
            Opts::new("store_retry_attempts_total", "Requests retried after throttling"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("store_request_duration_seconds", "Store request duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            events_read,
            events_appended,
            sync_conflicts,
            cache_requests,
            retry_attempts,
            request_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_events_read(&self, count: usize) {
        self.events_read.inc_by(count as u64);
    }

    pub fn record_events_appended(&self, count: usize) {
        self.events_appended.inc_by(count as u64);
    }

    pub fn record_conflict(&self) {
        self.sync_conflicts.inc();
    }

    pub fn record_cache(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_requests.with_label_values(&[result]).inc();
    }

    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts
            .with_label_values(&[operation, &attempt.to_string()])
            .inc();
    }

    pub fn observe_request(&self, operation: &str, duration_secs: f64) {
        self.request_duration
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}
