//! Conversion of call response parts into an HTTP response.
//!
//! # Responsibilities
//! - Turn the first `Headers` part into the HTTP response head
//! - Stream `Data` parts as body frames without buffering
//! - Emit `Trailers` parts as HTTP trailers
//!
//! # Design Decisions
//! - HTTP status is always 200 once the call adapter has produced headers;
//!   the call outcome travels in the RPC status
//! - Over HTTP/1.1 trailers are dropped by the transport, which is why only
//!   native HTTP/2 calls are given native trailers

use std::convert::Infallible;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body::Frame;
use http_body_util::StreamBody;
use tokio::sync::mpsc;

use crate::web::{Metadata, ResponsePart};

/// Convert ordered pairs into a header map, skipping invalid entries.
pub fn to_header_map(pairs: &Metadata) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::warn!(key = %key, "Dropping invalid response header"),
        }
    }
    map
}

/// Build the HTTP response from a call's response channel.
pub async fn from_call(mut rx: mpsc::Receiver<ResponsePart>) -> Response {
    let headers = match rx.recv().await {
        Some(ResponsePart::Headers(headers)) => headers,
        Some(other) => {
            tracing::error!(part = ?other, "Call produced body before headers");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        None => {
            tracing::debug!("Call abandoned before producing a response");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let frames = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await? {
                ResponsePart::Data(bytes) => {
                    return Some((Ok::<_, Infallible>(Frame::data(bytes)), rx));
                }
                ResponsePart::Trailers(trailers) => {
                    return Some((Ok(Frame::trailers(to_header_map(&trailers))), rx));
                }
                ResponsePart::Headers(_) => {
                    tracing::warn!("Ignoring headers sent after the response started");
                }
            }
        }
    });

    let mut response = Response::new(Body::new(StreamBody::new(frames)));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().extend(to_header_map(&headers));
    response
}
