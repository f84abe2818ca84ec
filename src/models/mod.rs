//! # Data Models
//!
//! This module contains the data models used throughout the event webhook.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod event;

pub use event::Event;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "event-webhook".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
