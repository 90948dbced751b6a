use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::policies::load_balancing::DefaultPolicy;
use scylla::statement::batch::Batch;
use scylla::value::{CqlTimestamp, CqlValue, Row};

use crate::config::{ConnectionMode, ConnectorSettings, Discovery};
use crate::error::{Result, StoreError};
use crate::event_sourcing::core::EventData;

use super::client::{AppendResult, Collections, Snapshot, StoreClient, StoredEvent, Tip};
use super::gateway::Connector;

// ============================================================================
// ScyllaDB Store Client
// ============================================================================
//
// One partition per stream:
// - clustering rows hold the events, ordered by sequence_number
// - static columns hold the stream version and the latest snapshot
//
// Appends are a single-partition conditional batch: the version check
// (`IF version = ?`) and the event inserts apply together or not at all.
//
// ============================================================================

pub struct ScyllaClient {
    session: Arc<Session>,
}

impl ScyllaClient {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    fn version_condition(expected_version: i64) -> &'static str {
        if expected_version == 0 {
            "IF version = null"
        } else {
            "IF version = ?"
        }
    }
}

#[async_trait]
impl StoreClient for ScyllaClient {
    async fn initialize(&self, collections: &Collections) -> Result<()> {
        self.session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}",
                    collections.database
                ),
                &[],
            )
            .await?;

        self.session
            .query_unpaged(
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        stream_name text,
                        sequence_number bigint,
                        event_type text,
                        event_data blob,
                        timestamp timestamp,
                        version bigint static,
                        snapshot_type text static,
                        snapshot_data blob static,
                        snapshot_version bigint static,
                        PRIMARY KEY (stream_name, sequence_number)
                    ) WITH CLUSTERING ORDER BY (sequence_number ASC)",
                    collections.qualified()
                ),
                &[],
            )
            .await?;

        tracing::info!(table = %collections.qualified(), "Stream table ready");
        Ok(())
    }

    async fn read_tip(&self, collections: &Collections, stream: &str) -> Result<Tip> {
        let result = self
            .session
            .query_unpaged(
                format!(
                    "SELECT version, snapshot_type, snapshot_data, snapshot_version
                     FROM {} WHERE stream_name = ? LIMIT 1",
                    collections.qualified()
                ),
                (stream,),
            )
            .await?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(Tip::default()),
        };

        let row = rows_result
            .maybe_first_row::<(Option<i64>, Option<String>, Option<Vec<u8>>, Option<i64>)>()
            .map_err(StoreError::backend)?;

        Ok(match row {
            Some((version, snapshot_type, snapshot_data, snapshot_version)) => Tip {
                version: version.unwrap_or(0),
                snapshot: match (snapshot_type, snapshot_data, snapshot_version) {
                    (Some(event_type), Some(data), Some(version)) => Some(Snapshot {
                        version,
                        event: EventData::new(event_type, data),
                    }),
                    _ => None,
                },
            },
            None => Tip::default(),
        })
    }

    async fn read_forward(
        &self,
        collections: &Collections,
        stream: &str,
        after: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>> {
        let cql = format!(
            "SELECT sequence_number, event_type, event_data, timestamp
             FROM {} WHERE stream_name = ? AND sequence_number > ?
             ORDER BY sequence_number ASC LIMIT ?",
            collections.qualified()
        );
        self.select_events(cql, stream, after, max_items).await
    }

    async fn read_backward(
        &self,
        collections: &Collections,
        stream: &str,
        before: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>> {
        let cql = format!(
            "SELECT sequence_number, event_type, event_data, timestamp
             FROM {} WHERE stream_name = ? AND sequence_number < ?
             ORDER BY sequence_number DESC LIMIT ?",
            collections.qualified()
        );
        self.select_events(cql, stream, before, max_items).await
    }

    async fn append(
        &self,
        collections: &Collections,
        stream: &str,
        expected_version: i64,
        events: Vec<EventData>,
        snapshot: Option<EventData>,
    ) -> Result<AppendResult> {
        let table = collections.qualified();
        let new_version = expected_version + events.len() as i64;
        let now = CqlTimestamp(Utc::now().timestamp_millis());

        let mut batch = Batch::default();
        let mut values: Vec<Vec<CqlValue>> = Vec::with_capacity(events.len() + 2);

        batch.append_statement(
            format!(
                "UPDATE {} SET version = ? WHERE stream_name = ? {}",
                table,
                Self::version_condition(expected_version)
            )
            .as_str(),
        );
        let mut condition = vec![CqlValue::BigInt(new_version), CqlValue::Text(stream.to_string())];
        if expected_version != 0 {
            condition.push(CqlValue::BigInt(expected_version));
        }
        values.push(condition);

        for (offset, event) in events.into_iter().enumerate() {
            batch.append_statement(
                format!(
                    "INSERT INTO {} (stream_name, sequence_number, event_type, event_data, timestamp)
                     VALUES (?, ?, ?, ?, ?)",
                    table
                )
                .as_str(),
            );
            values.push(vec![
                CqlValue::Text(stream.to_string()),
                CqlValue::BigInt(expected_version + offset as i64 + 1),
                CqlValue::Text(event.event_type),
                CqlValue::Blob(event.data),
                CqlValue::Timestamp(now),
            ]);
        }

        if let Some(snapshot) = snapshot {
            batch.append_statement(
                format!(
                    "UPDATE {} SET snapshot_type = ?, snapshot_data = ?, snapshot_version = ?
                     WHERE stream_name = ?",
                    table
                )
                .as_str(),
            );
            values.push(vec![
                CqlValue::Text(snapshot.event_type),
                CqlValue::Blob(snapshot.data),
                CqlValue::BigInt(new_version),
                CqlValue::Text(stream.to_string()),
            ]);
        }

        let result = self.session.batch(&batch, values).await?;

        let applied = result
            .into_rows_result()
            .map_err(StoreError::backend)?
            .rows::<Row>()
            .map_err(StoreError::backend)?
            .next()
            .transpose()
            .map_err(StoreError::backend)?
            .and_then(|row| match row.columns.first() {
                Some(Some(CqlValue::Boolean(applied))) => Some(*applied),
                _ => None,
            })
            .ok_or_else(|| StoreError::Backend("Conditional batch returned no [applied] column".to_string()))?;

        if applied {
            tracing::debug!(stream = %stream, version = new_version, "Appended events");
            return Ok(AppendResult::Written { version: new_version });
        }

        let actual_version = self.read_tip(collections, stream).await?.version;
        Ok(AppendResult::Conflict { actual_version })
    }
}

impl ScyllaClient {
    async fn select_events(
        &self,
        cql: String,
        stream: &str,
        bound: i64,
        max_items: usize,
    ) -> Result<Vec<StoredEvent>> {
        let limit = i32::try_from(max_items).unwrap_or(i32::MAX);
        let result = self.session.query_unpaged(cql, (stream, bound, limit)).await?;

        let mut events = Vec::new();

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(events), // No rows
        };

        for row in rows_result
            .rows::<(i64, String, Vec<u8>, DateTime<Utc>)>()
            .map_err(StoreError::backend)?
        {
            let (sequence_number, event_type, data, timestamp) = row.map_err(StoreError::backend)?;
            events.push(StoredEvent {
                sequence_number,
                event_type,
                data,
                timestamp,
            });
        }

        tracing::debug!(stream = %stream, count = events.len(), "Read event page");
        Ok(events)
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens a ScyllaDB session with the context's request policy
pub struct ScyllaConnector {
    mode: ConnectionMode,
    discovery: Discovery,
    settings: ConnectorSettings,
}

impl ScyllaConnector {
    pub fn new(mode: ConnectionMode, discovery: Discovery, settings: ConnectorSettings) -> Self {
        Self {
            mode,
            discovery,
            settings,
        }
    }
}

#[async_trait]
impl Connector for ScyllaConnector {
    async fn connect(&self, app_name: &str) -> Result<Arc<dyn StoreClient>> {
        tracing::info!(
            app = app_name,
            mode = ?self.mode,
            contact_points = ?self.discovery.contact_points,
            "Connecting to ScyllaDB..."
        );

        let load_balancing = DefaultPolicy::builder()
            .token_aware(self.mode.is_token_aware())
            .build();

        let profile = ExecutionProfile::builder()
            .request_timeout(Some(self.settings.request_timeout))
            .load_balancing_policy(load_balancing)
            .build();

        let mut builder = SessionBuilder::new()
            .known_nodes(&self.discovery.contact_points)
            .default_execution_profile_handle(profile.into_handle());

        if let Some(credentials) = &self.discovery.credentials {
            builder = builder.user(&credentials.username, &credentials.password);
        }

        let session = builder.build().await?;

        tracing::info!(app = app_name, "Connected to ScyllaDB");
        Ok(Arc::new(ScyllaClient::new(Arc::new(session))))
    }
}
