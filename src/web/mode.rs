//! Content negotiation.
//!
//! The request `content-type` fixes both the wire protocol and the body
//! encoding for the lifetime of a call:
//!
//! | content-type                        | protocol | encoding |
//! |-------------------------------------|----------|----------|
//! | `application/grpc[+subtype]`          | Native   | Binary   |
//! | `application/grpc-web[+subtype]`      | Web      | Binary   |
//! | `application/grpc-web-text[+subtype]` | Web      | Text     |

use std::time::Duration;

/// Body encoding of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMode {
    Binary,
    Text,
}

impl EncodingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EncodingMode::Binary => "binary",
            EncodingMode::Text => "text",
        }
    }
}

/// Which flavour of the protocol the client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireProtocol {
    /// Browser-compatible variant; status always travels in the body.
    Web,
    /// Native framing over HTTP/2 with real trailers.
    Native,
}

/// Result of negotiating a request's content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub protocol: WireProtocol,
    pub mode: EncodingMode,
}

impl Negotiated {
    /// Negotiate from a `content-type` value. Returns `None` for non-RPC bodies.
    pub fn from_content_type(content_type: &str) -> Option<Negotiated> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let base = essence.split('+').next().unwrap_or_default();

        let (protocol, mode) = match base {
            "application/grpc" => (WireProtocol::Native, EncodingMode::Binary),
            "application/grpc-web" => (WireProtocol::Web, EncodingMode::Binary),
            "application/grpc-web-text" => (WireProtocol::Web, EncodingMode::Text),
            _ => return None,
        };
        Some(Negotiated { protocol, mode })
    }

    /// Content type written on the response.
    pub fn response_content_type(&self) -> &'static str {
        match (self.protocol, self.mode) {
            (WireProtocol::Native, _) => "application/grpc",
            (WireProtocol::Web, EncodingMode::Binary) => "application/grpc-web",
            (WireProtocol::Web, EncodingMode::Text) => "application/grpc-web-text",
        }
    }

    /// Only the native protocol reads status from transport trailers.
    pub fn supports_native_trailers(&self) -> bool {
        self.protocol == WireProtocol::Native
    }
}

/// Parse a `grpc-timeout` header value such as `100m` or `5S`.
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}
