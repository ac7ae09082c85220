//! Error type for the Request Engine and Client Gateway boundary.
//!
//! A `thiserror`-derived enum with a `status_code()` and an `into_response()`,
//! so the gateway's top-level handler has one place that turns any engine
//! fault into the JSON error schema.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("upstream is temporarily blocked")]
    IpBlocked {
        unblock_at: DateTime<Utc>,
        remaining_minutes: i64,
    },

    #[error("no usable credentials")]
    ServiceUnavailable { reason: String },

    #[error("unauthorized")]
    Unauthorized,

    #[error("upstream request timed out")]
    GatewayTimeout,

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("client aborted the request")]
    RequestAborted,

    #[error("request body exceeds the size limit")]
    PayloadTooLarge,

    #[error("invalid json body: {0}")]
    InvalidJson(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    unblock_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_minutes: Option<i64>,
}

impl EngineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::IpBlocked { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            EngineError::StreamError(_) => StatusCode::BAD_GATEWAY,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::RequestAborted => StatusCode::BAD_REQUEST,
            EngineError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            EngineError::InvalidJson(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            EngineError::IpBlocked { .. } => "ip_blocked",
            EngineError::ServiceUnavailable { .. } => "service_unavailable",
            EngineError::Unauthorized => "unauthorized",
            EngineError::GatewayTimeout => "gateway_timeout",
            EngineError::StreamError(_) => "stream_error",
            EngineError::Internal(_) => "internal_error",
            EngineError::RequestAborted => "request_aborted",
            EngineError::PayloadTooLarge => "payload_too_large",
            EngineError::InvalidJson(_) => "invalid_json",
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.error_type();
        let (unblock_at, remaining_minutes) = match &self {
            EngineError::IpBlocked {
                unblock_at,
                remaining_minutes,
            } => (Some(*unblock_at), Some(*remaining_minutes)),
            _ => (None, None),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                message: self.to_string(),
                kind,
                unblock_at,
                remaining_minutes,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        EngineError::into_response(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_blocked_maps_to_service_unavailable() {
        let error = EngineError::IpBlocked {
            unblock_at: Utc::now(),
            remaining_minutes: 30,
        };
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.error_type(), "ip_blocked");
    }

    #[test]
    fn payload_too_large_maps_to_413() {
        assert_eq!(EngineError::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
