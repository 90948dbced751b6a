use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::event_sourcing::core::EventData;
use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, retry_when, RetryConfig};

use super::client::{AppendResult, Collections, StoreClient, StoredEvent, Tip};

// ============================================================================
// Gateway - pooled connection + request policies
// ============================================================================
//
// Wraps a connected client with:
// - the batching policy (page size for every event read)
// - the throttling retry (transient failures retried with backoff); appends
//   retry throttling only, a timed out write may already have been applied
// - an optional deadline per request, covering all of its attempts
// - request metrics
//
// A `Store` pairs a gateway with the keyspace/table streams live in.
//
// ============================================================================

/// Page size used when reading events
pub const DEFAULT_MAX_ITEMS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchingPolicy {
    pub max_items: usize,
}

impl BatchingPolicy {
    pub fn new(default_max_items: usize) -> Self {
        Self {
            max_items: default_max_items.max(1),
        }
    }
}

impl Default for BatchingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

/// Establishes the connection a gateway is built on
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, app_name: &str) -> Result<Arc<dyn StoreClient>>;
}

#[derive(Clone)]
pub struct Gateway {
    client: Arc<dyn StoreClient>,
    batching: BatchingPolicy,
    retry: RetryConfig,
    request_timeout: Option<Duration>,
    metrics: Arc<Metrics>,
}

impl Gateway {
    pub fn new(
        client: Arc<dyn StoreClient>,
        batching: BatchingPolicy,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            batching,
            retry,
            request_timeout: None,
            metrics,
        }
    }

    /// Bound every request, retries included, by `timeout`
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn batching(&self) -> BatchingPolicy {
        self.batching
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub async fn initialize(&self, collections: &Collections) -> Result<()> {
        self.client.initialize(collections).await
    }

    pub async fn read_tip(&self, collections: &Collections, stream: &str) -> Result<Tip> {
        let started = Instant::now();
        let tip = self
            .within_deadline(
                "read_tip",
                retry_on_transient(&self.retry, "read_tip", |attempt| {
                    self.note_attempt("read_tip", attempt);
                    self.client.read_tip(collections, stream)
                }),
            )
            .await?;
        self.metrics.observe_request("read_tip", started.elapsed().as_secs_f64());
        Ok(tip)
    }

    /// Every event after `after`, ascending, read in pages of `max_items`
    pub async fn read_forward(
        &self,
        collections: &Collections,
        stream: &str,
        after: i64,
    ) -> Result<Vec<StoredEvent>> {
        let started = Instant::now();
        let max_items = self.batching.max_items;
        let mut events = Vec::new();
        let mut position = after;

        loop {
            let page = self
                .within_deadline(
                    "read_forward",
                    retry_on_transient(&self.retry, "read_forward", |attempt| {
                        self.note_attempt("read_forward", attempt);
                        self.client.read_forward(collections, stream, position, max_items)
                    }),
                )
                .await?;

            let page_len = page.len();
            if let Some(last) = page.last() {
                position = last.sequence_number;
            }
            events.extend(page);

            if page_len < max_items {
                break;
            }
        }

        self.metrics.record_events_read(events.len());
        self.metrics.observe_request("read_forward", started.elapsed().as_secs_f64());
        Ok(events)
    }

    /// Reads newest-first in pages until `is_origin` matches, returning the
    /// events from the origin (inclusive) onwards in ascending order. Without
    /// an origin the whole stream is returned.
    pub async fn read_backward_to_origin<F>(
        &self,
        collections: &Collections,
        stream: &str,
        is_origin: F,
    ) -> Result<Vec<StoredEvent>>
    where
        F: Fn(&StoredEvent) -> bool,
    {
        let started = Instant::now();
        let max_items = self.batching.max_items;
        let mut newest_first = Vec::new();
        let mut before = i64::MAX;

        'pages: loop {
            let page = self
                .within_deadline(
                    "read_backward",
                    retry_on_transient(&self.retry, "read_backward", |attempt| {
                        self.note_attempt("read_backward", attempt);
                        self.client.read_backward(collections, stream, before, max_items)
                    }),
                )
                .await?;

            let page_len = page.len();
            for event in page {
                before = event.sequence_number;
                let origin = is_origin(&event);
                newest_first.push(event);
                if origin {
                    break 'pages;
                }
            }

            if page_len < max_items {
                break;
            }
        }

        newest_first.reverse();
        self.metrics.record_events_read(newest_first.len());
        self.metrics.observe_request("read_backward", started.elapsed().as_secs_f64());
        Ok(newest_first)
    }

    pub async fn append(
        &self,
        collections: &Collections,
        stream: &str,
        expected_version: i64,
        events: Vec<EventData>,
        snapshot: Option<EventData>,
    ) -> Result<AppendResult> {
        let started = Instant::now();
        let count = events.len();
        let result = self
            .within_deadline(
                "append",
                retry_when(&self.retry, "append", StoreError::is_throttled, |attempt| {
                    self.note_attempt("append", attempt);
                    self.client.append(
                        collections,
                        stream,
                        expected_version,
                        events.clone(),
                        snapshot.clone(),
                    )
                }),
            )
            .await?;

        match result {
            AppendResult::Written { version } => {
                self.metrics.record_events_appended(count);
                tracing::info!(
                    stream = %stream,
                    new_version = version,
                    event_count = count,
                    "Appended events to stream"
                );
            }
            AppendResult::Conflict { actual_version } => {
                self.metrics.record_conflict();
                tracing::warn!(
                    stream = %stream,
                    expected_version = expected_version,
                    actual_version = actual_version,
                    "Concurrency conflict on append"
                );
            }
        }

        self.metrics.observe_request("append", started.elapsed().as_secs_f64());
        Ok(result)
    }

    async fn within_deadline<T>(&self, operation: &str, request: impl Future<Output = Result<T>>) -> Result<T> {
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, request).await.map_err(|_| {
                StoreError::Timeout(format!("{} did not complete within {:?}", operation, limit))
            })?,
            None => request.await,
        }
    }

    fn note_attempt(&self, operation: &str, attempt: u32) {
        if attempt > 1 {
            self.metrics.record_retry_attempt(operation, attempt);
        }
    }
}

/// Gateway bound to the keyspace/table holding the streams
#[derive(Clone)]
pub struct Store {
    gateway: Gateway,
    collections: Collections,
}

impl Store {
    pub fn new(gateway: Gateway, collections: Collections) -> Self {
        Self { gateway, collections }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::store::MemoryClient;
    use std::time::Duration;

    fn gateway_over(client: Arc<MemoryClient>, max_items: usize, retries: u32) -> Gateway {
        Gateway::new(
            client,
            BatchingPolicy::new(max_items),
            RetryConfig::throttling(retries, Duration::from_millis(10)),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn collections() -> Collections {
        Collections::new("test", "events").unwrap()
    }

    fn events(names: &[&str]) -> Vec<EventData> {
        names
            .iter()
            .map(|n| EventData::new(*n, n.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_default_batching_policy_is_500_items() {
        assert_eq!(BatchingPolicy::default().max_items, 500);
        assert_eq!(BatchingPolicy::new(0).max_items, 1);
    }

    #[tokio::test]
    async fn test_read_forward_follows_pages() {
        let client = Arc::new(MemoryClient::new());
        let gateway = gateway_over(client.clone(), 2, 0);
        let c = collections();
        gateway
            .append(&c, "s", 0, events(&["a", "b", "c", "d", "e"]), None)
            .await
            .unwrap();

        let read = gateway.read_forward(&c, "s", 0).await.unwrap();
        assert_eq!(read.len(), 5);
        // Pages of 2: [a b] [c d] [e]
        assert_eq!(client.event_reads(), 3);
    }

    #[tokio::test]
    async fn test_read_backward_stops_at_origin() {
        let client = Arc::new(MemoryClient::new());
        let gateway = gateway_over(client.clone(), 2, 0);
        let c = collections();
        gateway
            .append(&c, "s", 0, events(&["a", "reset", "b", "c", "d"]), None)
            .await
            .unwrap();

        let read = gateway
            .read_backward_to_origin(&c, "s", |e| e.event_type == "reset")
            .await
            .unwrap();

        let types: Vec<&str> = read.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["reset", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_read_backward_without_origin_reads_everything() {
        let client = Arc::new(MemoryClient::new());
        let gateway = gateway_over(client, 2, 0);
        let c = collections();
        gateway.append(&c, "s", 0, events(&["a", "b", "c"]), None).await.unwrap();

        let read = gateway.read_backward_to_origin(&c, "s", |_| false).await.unwrap();
        let numbers: Vec<i64> = read.iter().map(|e| e.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_throttled_request_is_retried() {
        let client = Arc::new(MemoryClient::new());
        let gateway = gateway_over(client.clone(), 500, 1);
        client.throttle_next(1);

        let tip = gateway.read_tip(&collections(), "s").await.unwrap();
        assert_eq!(tip, Tip::default());
    }

    #[tokio::test]
    async fn test_throttling_beyond_retries_surfaces() {
        let client = Arc::new(MemoryClient::new());
        let gateway = gateway_over(client.clone(), 500, 1);
        client.throttle_next(2);

        let result = gateway.append(&collections(), "s", 0, events(&["a"]), None).await;
        assert!(matches!(result, Err(StoreError::Throttled(_))));
    }

    #[tokio::test]
    async fn test_throttled_append_is_retried() {
        let client = Arc::new(MemoryClient::new());
        let gateway = gateway_over(client.clone(), 500, 1);
        client.throttle_next(1);

        let result = gateway.append(&collections(), "s", 0, events(&["a"]), None).await.unwrap();
        assert_eq!(result, AppendResult::Written { version: 1 });
    }

    #[tokio::test]
    async fn test_request_timeout_covers_retries() {
        let client = Arc::new(MemoryClient::new());
        let gateway = Gateway::new(
            client.clone(),
            BatchingPolicy::default(),
            RetryConfig::throttling(5, Duration::from_secs(1)),
            Arc::new(Metrics::new().unwrap()),
        )
        .with_request_timeout(Duration::from_millis(50));
        client.throttle_next(10);

        let started = Instant::now();
        let result = gateway.read_tip(&collections(), "s").await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
