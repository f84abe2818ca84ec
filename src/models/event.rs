//! Event entity model
//!
//! An [`Event`] is decoded from the webhook payload, receives its identifier and
//! creation timestamp from the event store, and is echoed back to the caller.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Ingested event
///
/// Caller-supplied fields default to the empty string when absent. `id` and
/// `created_at` are never read from the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Event {
    /// Identifier assigned on insert
    #[serde(skip_deserializing)]
    pub id: Option<Uuid>,
    #[serde(deserialize_with = "null_as_empty")]
    pub ding_id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub device_id: String,
    /// Doorbot identifier as text. Must hold a base-10 integer in the signed
    /// 64-bit range; it is stored as a number. Decimals are rejected.
    #[serde(deserialize_with = "null_as_empty")]
    #[schema(example = "42")]
    pub doorbot_id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub agent_id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub location_id: String,
    #[serde(rename = "type", deserialize_with = "null_as_empty")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub comment: String,
    /// Insert time, RFC 3339 with second precision
    #[serde(skip_deserializing, serialize_with = "serialize_created_at")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Rejections for payloads that decode but cannot be stored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventValidationError {
    #[error("doorbot_id is required")]
    MissingDoorbotId,
    #[error("doorbot_id must be a 64-bit integer, got '{value}'")]
    InvalidDoorbotId { value: String },
}

impl Event {
    /// Parses `doorbot_id` into the numeric form used as the table hash key.
    pub fn doorbot_number(&self) -> Result<i64, EventValidationError> {
        if self.doorbot_id.is_empty() {
            return Err(EventValidationError::MissingDoorbotId);
        }

        self.doorbot_id
            .parse::<i64>()
            .map_err(|_| EventValidationError::InvalidDoorbotId {
                value: self.doorbot_id.clone(),
            })
    }

    pub fn validate(&self) -> Result<(), EventValidationError> {
        self.doorbot_number().map(|_| ())
    }
}

/// Formats a timestamp the way `created_at` is stored and returned.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decodes a string field, treating `null` like an absent field.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn serialize_created_at<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(timestamp) => serializer.serialize_str(&format_timestamp(timestamp)),
        None => serializer.serialize_none(),
    }
}
