use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::event_sourcing::core::EventData;

use super::client::{AppendResult, Collections, Snapshot, StoreClient, StoredEvent, Tip};

// ============================================================================
// In-Memory Store Client
// ============================================================================
//
// Same contract as the ScyllaDB client, held in process. Used by the memory
// context and by tests, which can also make it throttle on demand and count
// the reads it served.
//
// ============================================================================

#[derive(Default)]
struct StreamData {
    events: Vec<StoredEvent>,
    snapshot: Option<Snapshot>,
}

impl StreamData {
    fn version(&self) -> i64 {
        self.events.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

#[derive(Default)]
pub struct MemoryClient {
    streams: RwLock<HashMap<(String, String), StreamData>>,
    throttle_next: AtomicU32,
    event_reads: AtomicU64,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` requests with a throttling error
    pub fn throttle_next(&self, count: u32) {
        self.throttle_next.store(count, Ordering::SeqCst);
    }

    /// Number of event pages served so far
    pub fn event_reads(&self) -> u64 {
        self.event_reads.load(Ordering::SeqCst)
    }

    fn check_throttle(&self) -> Result<()> {
        let throttled = self
            .throttle_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if throttled {
            return Err(StoreError::Throttled("request rate too large".to_string()));
        }
        Ok(())
    }

    fn key(collections: &Collections, stream: &str) -> (String, String) {
        (collections.qualified(), stream.to_string())
    }
}

#[async_trait]
impl StoreClient for MemoryClient {
    async fn initialize(&self, _collections: &Collections) -> Result<()> {
        Ok(())
    }

    async fn read_tip(&self, collections: &Collections, stream: &str) -> Result<Tip> {
        self.check_throttle()?;
        let streams = self.streams.read().await;
        Ok(streams
            .get(&Self::key(collections, stream))
            .map(|data| Tip {
                version: data.version(),
                snapshot: data.snapshot.clone(),
            })
            .unwrap_or_default())
    }

    async fn read_forward(
        &self,
        collections: &Collections,
        stream: &str,
        after: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>> {
        self.check_throttle()?;
        self.event_reads.fetch_add(1, Ordering::SeqCst);
        let streams = self.streams.read().await;
        Ok(streams
            .get(&Self::key(collections, stream))
            .map(|data| {
                data.events
                    .iter()
                    .filter(|e| e.sequence_number > after)
                    .take(max_items)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_backward(
        &self,
        collections: &Collections,
        stream: &str,
        before: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>> {
        self.check_throttle()?;
        self.event_reads.fetch_add(1, Ordering::SeqCst);
        let streams = self.streams.read().await;
        Ok(streams
            .get(&Self::key(collections, stream))
            .map(|data| {
                data.events
                    .iter()
                    .rev()
                    .filter(|e| e.sequence_number < before)
                    .take(max_items)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append(
        &self,
        collections: &Collections,
        stream: &str,
        expected_version: i64,
        events: Vec<EventData>,
        snapshot: Option<EventData>,
    ) -> Result<AppendResult> {
        self.check_throttle()?;
        let mut streams = self.streams.write().await;
        let data = streams.entry(Self::key(collections, stream)).or_default();

        let actual_version = data.version();
        if actual_version != expected_version {
            return Ok(AppendResult::Conflict { actual_version });
        }

        let now = Utc::now();
        let mut version = actual_version;
        for event in events {
            version += 1;
            data.events.push(StoredEvent {
                sequence_number: version,
                event_type: event.event_type,
                data: event.data,
                timestamp: now,
            });
        }

        if let Some(event) = snapshot {
            data.snapshot = Some(Snapshot { version, event });
        }

        Ok(AppendResult::Written { version })
    }
}
