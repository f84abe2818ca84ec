//! Event repository for table operations
//!
//! Owns the events table: makes sure it exists when constructed and writes one
//! item per inserted event, keyed by `doorbot_id` (hash) and `created_at`
//! (range).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Timelike, Utc};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

use super::table::{
    AttributeKind, AttributeValue, Item, KeyAttribute, TableClient, TableError, TableSchema,
    TableStatus,
};
use crate::models::event::{Event, EventValidationError, format_timestamp};

/// Hash key attribute of the events table
pub const HASH_KEY: &str = "doorbot_id";
/// Range key attribute of the events table
pub const RANGE_KEY: &str = "created_at";

const READ_CAPACITY_UNITS: i64 = 5;
const WRITE_CAPACITY_UNITS: i64 = 5;

const DEFAULT_READY_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_READY_POLL_ATTEMPTS: u32 = 60;

/// Errors raised while provisioning the table or writing events.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("error ensuring if table {table} exists: {source}")]
    Describe {
        table: String,
        #[source]
        source: TableError,
    },
    #[error("failed creating table {table}: {source}")]
    Create {
        table: String,
        #[source]
        source: TableError,
    },
    #[error("table {table} did not become active after {attempts} checks")]
    NotReady { table: String, attempts: u32 },
    #[error(transparent)]
    InvalidEvent(#[from] EventValidationError),
    #[error("put item into table {table} failed: {source}")]
    Write {
        table: String,
        #[source]
        source: TableError,
    },
}

/// Persistence capability for events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Stores `event` as a new record and returns it with `id` and
    /// `created_at` assigned. Single attempt; no retry.
    async fn insert(&self, event: Event) -> Result<Event, StoreError>;
}

/// [`EventStore`] writing to a table through a [`TableClient`]
#[derive(Debug)]
pub struct EventRepository<C> {
    client: Arc<C>,
    table: String,
}

impl<C: TableClient> EventRepository<C> {
    /// Creates the repository, creating the table first if it does not exist.
    pub async fn new(client: Arc<C>, table: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_readiness(
            client,
            table,
            DEFAULT_READY_POLL_INTERVAL,
            DEFAULT_READY_POLL_ATTEMPTS,
        )
        .await
    }

    /// Like [`EventRepository::new`] with explicit polling while a table
    /// finishes creating.
    pub async fn with_readiness(
        client: Arc<C>,
        table: impl Into<String>,
        poll_interval: Duration,
        poll_attempts: u32,
    ) -> Result<Self, StoreError> {
        let repository = Self {
            client,
            table: table.into(),
        };
        repository.ensure_table(poll_interval, poll_attempts).await?;
        Ok(repository)
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Schema the events table is created with.
    pub fn table_schema(table: &str) -> TableSchema {
        TableSchema {
            table_name: table.to_string(),
            hash_key: KeyAttribute {
                name: HASH_KEY.to_string(),
                kind: AttributeKind::Number,
            },
            range_key: KeyAttribute {
                name: RANGE_KEY.to_string(),
                kind: AttributeKind::String,
            },
            read_capacity_units: READ_CAPACITY_UNITS,
            write_capacity_units: WRITE_CAPACITY_UNITS,
        }
    }

    async fn ensure_table(&self, poll_interval: Duration, poll_attempts: u32) -> Result<(), StoreError> {
        match self.client.describe_table(&self.table).await {
            Ok(TableStatus::Active) => {
                debug!(table = %self.table, "Events table already exists");
                Ok(())
            }
            Ok(TableStatus::Pending) => self.wait_until_active(poll_interval, poll_attempts).await,
            Err(TableError::NotFound { .. }) => {
                info!(table = %self.table, "Events table not found, creating it");
                self.client
                    .create_table(&Self::table_schema(&self.table))
                    .await
                    .map_err(|source| StoreError::Create {
                        table: self.table.clone(),
                        source,
                    })?;
                self.wait_until_active(poll_interval, poll_attempts).await
            }
            Err(source) => Err(StoreError::Describe {
                table: self.table.clone(),
                source,
            }),
        }
    }

    async fn wait_until_active(&self, poll_interval: Duration, poll_attempts: u32) -> Result<(), StoreError> {
        for attempt in 1..=poll_attempts {
            match self.client.describe_table(&self.table).await {
                Ok(TableStatus::Active) => {
                    info!(table = %self.table, attempt, "Events table is active");
                    return Ok(());
                }
                // Creation is eventually consistent; describe may briefly miss the table.
                Ok(TableStatus::Pending) | Err(TableError::NotFound { .. }) => {
                    debug!(table = %self.table, attempt, "Waiting for events table to become active");
                    sleep(poll_interval).await;
                }
                Err(source) => {
                    return Err(StoreError::Describe {
                        table: self.table.clone(),
                        source,
                    });
                }
            }
        }

        Err(StoreError::NotReady {
            table: self.table.clone(),
            attempts: poll_attempts,
        })
    }
}

/// Maps an event to table attributes; `doorbot_id` is the only number.
fn event_item(event: &Event, id: Uuid, doorbot_id: i64, created_at: &str) -> Item {
    let text = |value: &str| AttributeValue::S(value.to_string());

    Item::from([
        ("id".to_string(), text(&id.to_string())),
        ("ding_id".to_string(), text(&event.ding_id)),
        ("device_id".to_string(), text(&event.device_id)),
        (HASH_KEY.to_string(), AttributeValue::N(doorbot_id.to_string())),
        ("agent_id".to_string(), text(&event.agent_id)),
        ("location_id".to_string(), text(&event.location_id)),
        ("type".to_string(), text(&event.kind)),
        ("comment".to_string(), text(&event.comment)),
        (RANGE_KEY.to_string(), text(created_at)),
    ])
}

#[async_trait]
impl<C: TableClient> EventStore for EventRepository<C> {
    async fn insert(&self, mut event: Event) -> Result<Event, StoreError> {
        let doorbot_id = event.doorbot_number()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let created_at = now.with_nanosecond(0).unwrap_or(now);

        let item = event_item(&event, id, doorbot_id, &format_timestamp(&created_at));
        self.client
            .put_item(&self.table, item)
            .await
            .map_err(|source| StoreError::Write {
                table: self.table.clone(),
                source,
            })?;

        event.id = Some(id);
        event.created_at = Some(created_at);

        debug!(
            table = %self.table,
            event_id = %id,
            doorbot_id,
            "Inserted event"
        );

        Ok(event)
    }
}
