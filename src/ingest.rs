//! Event ingestion
//!
//! Turns a raw webhook payload into a stored event and back into JSON. Each
//! call is one decode → insert → encode pass with no retries.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::models::event::{Event, EventValidationError};
use crate::repositories::{EventStore, StoreError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed decoding event: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventValidationError),
    #[error("failed inserting event: {0}")]
    Insert(#[source] StoreError),
    #[error("failed encoding event: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Bridges request payloads to the event store
#[derive(Clone)]
pub struct EventIngestor {
    store: Arc<dyn EventStore>,
}

impl EventIngestor {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Decodes `payload`, stores it and returns the stored event as JSON.
    ///
    /// The store is not called when the payload fails to decode or validate.
    pub async fn create(&self, payload: &[u8]) -> Result<Vec<u8>, IngestError> {
        let event: Event = serde_json::from_slice(payload).map_err(IngestError::Decode)?;
        event.validate()?;

        let stored = self.store.insert(event).await.map_err(IngestError::Insert)?;
        debug!(event_id = ?stored.id, doorbot_id = %stored.doorbot_id, "Event ingested");

        serde_json::to_vec(&stored).map_err(IngestError::Encode)
    }
}
