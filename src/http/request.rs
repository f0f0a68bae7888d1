//! Request inspection.
//!
//! # Responsibilities
//! - Request ID generation and propagation (`x-request-id`)
//! - Extract call metadata (content type, deadline) from headers

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderName};
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

use crate::web::mode::parse_grpc_timeout;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header carrying the client deadline.
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

/// Layer assigning a UUID request ID when the client sent none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer copying the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Request ID set by [`set_request_id_layer`], or `"unknown"`.
pub fn request_id(extensions: &axum::http::Extensions) -> String {
    extensions
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Raw `content-type` value, empty when missing or not ASCII.
pub fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Deadline requested through `grpc-timeout`, ignoring malformed values.
pub fn deadline(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(GRPC_TIMEOUT)?.to_str().ok()?;
    let parsed = parse_grpc_timeout(value);
    if parsed.is_none() {
        tracing::debug!(value = %value, "Ignoring malformed grpc-timeout");
    }
    parsed
}
