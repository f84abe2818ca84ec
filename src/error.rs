//! # Error Handling
//!
//! Maps ingestion failures onto HTTP responses. Error responses carry the
//! error message as a plain-text body; the trace ID travels in `X-Trace-Id`.

use axum::{
    extract::rejection::BytesRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::ingest::IngestError;
use crate::repositories::StoreError;
use crate::telemetry;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// HTTP-facing error
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status code for the response
    pub status: StatusCode,
    /// Human-readable error message, sent as the response body
    pub message: Box<str>,
    /// Correlation trace ID for debugging (optional)
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into().into_boxed_str(),
            trace_id: telemetry::current_trace_id().map(String::into_boxed_str),
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn bad_gateway<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                trace_id = self.trace_id.as_deref(),
                message = %self.message,
                "Request failed"
            );
        } else {
            tracing::warn!(
                status = self.status.as_u16(),
                trace_id = self.trace_id.as_deref(),
                message = %self.message,
                "Request rejected"
            );
        }

        let mut response = (self.status, String::from(self.message)).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(TEXT_CONTENT_TYPE),
        );
        if let Some(trace_id) = self.trace_id
            && let Ok(value) = HeaderValue::from_str(&trace_id)
        {
            response
                .headers_mut()
                .insert(telemetry::TRACE_ID_HEADER, value);
        }
        response
    }
}

impl From<IngestError> for ApiError {
    fn from(error: IngestError) -> Self {
        let message = error.to_string();
        match error {
            IngestError::Decode(_)
            | IngestError::InvalidEvent(_)
            | IngestError::Insert(StoreError::InvalidEvent(_)) => Self::bad_request(message),
            IngestError::Insert(_) => Self::bad_gateway(message),
            IngestError::Encode(_) => Self::internal(message),
        }
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}
