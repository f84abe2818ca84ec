//! # Event Handlers
//!
//! Webhook endpoint that persists incoming events.

use axum::{
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::info;

use crate::error::ApiError;
use crate::server::AppState;

/// Content type of a successful event response.
pub const EVENT_CONTENT_TYPE: &str = "application/json; charset=utf8";

/// Store an event and echo it back with its assigned identity
#[utoipa::path(
    post,
    path = "/event",
    request_body(
        content = crate::models::Event,
        description = "Event payload; `doorbot_id` must hold a signed 64-bit base-10 integer (decimals and exponents are rejected)",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Event stored", body = crate::models::Event),
        (status = 400, description = "Payload is not a valid event", body = String, content_type = "text/plain"),
        (status = 413, description = "Payload exceeds the configured body limit", body = String, content_type = "text/plain"),
        (status = 502, description = "Event store rejected the write", body = String, content_type = "text/plain")
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body?;
    let stored = state.ingestor.create(&body).await?;

    info!(bytes = body.len(), "Event stored");

    let mut response = (StatusCode::OK, stored).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(EVENT_CONTENT_TYPE),
    );
    Ok(response)
}
