use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};
use crate::event_sourcing::core::EventData;

// ============================================================================
// Store Client - raw stream persistence
// ============================================================================
//
// One implementation per backend. A client knows nothing about codecs,
// folds or caching; it reads and conditionally appends encoded events.
//
// Each stream carries:
// - its events, numbered from 1 (`sequence_number`)
// - its version (the last sequence number, 0 when empty)
// - optionally one snapshot event written alongside the last append
//
// ============================================================================

/// Keyspace + table a store maps streams onto
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collections {
    pub database: String,
    pub collection: String,
}

impl Collections {
    /// Names end up in CQL text, so only plain identifiers are accepted
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Result<Self> {
        let database = database.into();
        let collection = collection.into();
        for name in [&database, &collection] {
            if !is_identifier(name) {
                return Err(StoreError::Config(format!("Invalid keyspace/table name '{}'", name)));
            }
        }
        Ok(Self { database, collection })
    }

    pub fn qualified(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 48
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub sequence_number: i64,
    pub event_type: String,
    pub data: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    pub fn to_event_data(&self) -> EventData {
        EventData::new(self.event_type.clone(), self.data.clone())
    }

    pub fn size(&self) -> usize {
        self.event_type.len() + self.data.len()
    }
}

/// Compacted representation of a stream as of `version`
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: i64,
    pub event: EventData,
}

/// Stream metadata read without touching the events
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tip {
    pub version: i64,
    pub snapshot: Option<Snapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    Written { version: i64 },
    Conflict { actual_version: i64 },
}

#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Create whatever the collections need (keyspace, table)
    async fn initialize(&self, collections: &Collections) -> Result<()>;

    async fn read_tip(&self, collections: &Collections, stream: &str) -> Result<Tip>;

    /// Events with `sequence_number > after`, ascending, at most `max_items`
    async fn read_forward(
        &self,
        collections: &Collections,
        stream: &str,
        after: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>>;

    /// Events with `sequence_number < before`, descending, at most `max_items`
    async fn read_backward(
        &self,
        collections: &Collections,
        stream: &str,
        before: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>>;

    /// Append iff the stream is at `expected_version`. When given, the
    /// snapshot replaces the stream's snapshot atomically with the events.
    async fn append(
        &self,
        collections: &Collections,
        stream: &str,
        expected_version: i64,
        events: Vec<EventData>,
        snapshot: Option<EventData>,
    ) -> Result<AppendResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collections_accepts_identifiers() {
        let collections = Collections::new("equinox", "todo_events").unwrap();
        assert_eq!(collections.qualified(), "equinox.todo_events");
    }

    #[test]
    fn test_collections_rejects_injection() {
        assert!(Collections::new("equinox; DROP KEYSPACE x", "events").is_err());
        assert!(Collections::new("equinox", "").is_err());
        assert!(Collections::new("1st", "events").is_err());
        assert!(Collections::new("equinox", "my-table").is_err());
    }
}
