//! Bridge error taxonomy and its mapping onto call statuses.

use thiserror::Error;

use super::frame::FrameError;
use super::status::{Code, Status};
use super::text::TextError;

/// Errors that end a call inside the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Request body violated the unary request contract.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Framing error on either direction.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Base64 error in text mode.
    #[error(transparent)]
    Text(#[from] TextError),

    /// Response message exceeds the configured send limit.
    #[error("response message of {size} bytes exceeds the limit of {limit} bytes")]
    SendTooLarge { size: usize, limit: usize },

    /// Reading the request body from the transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// Client went away while the response was being written.
    #[error("response stream closed by the transport")]
    ResponseClosed,
}

impl BridgeError {
    /// Status reported to the client for this error.
    pub fn to_status(&self) -> Status {
        match self {
            BridgeError::Frame(FrameError::MessageTooLarge { size, limit }) => Status::new(
                Code::ResourceExhausted,
                format!(
                    "Received message exceeds the maximum configured message size ({} > {}).",
                    size, limit
                ),
            ),
            BridgeError::SendTooLarge { size, limit } => Status::new(
                Code::ResourceExhausted,
                format!(
                    "Sending message exceeds the maximum configured message size ({} > {}).",
                    size, limit
                ),
            ),
            BridgeError::Frame(e) => Status::internal(e.to_string()),
            BridgeError::Text(e) => Status::internal(e.to_string()),
            BridgeError::MalformedRequest(msg) => Status::internal(msg.clone()),
            BridgeError::Transport(msg) => Status::new(Code::Unavailable, msg.clone()),
            BridgeError::ResponseClosed => Status::new(Code::Cancelled, "Call cancelled by client."),
        }
    }

    /// Whether the transport is still usable for reporting a status.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, BridgeError::Transport(_) | BridgeError::ResponseClosed)
    }

    /// Short label used in metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            BridgeError::MalformedRequest(_) => "malformed_request",
            BridgeError::Frame(FrameError::MessageTooLarge { .. }) => "message_too_large",
            BridgeError::Frame(FrameError::FrameTooLarge(_)) => "frame_too_large",
            BridgeError::Frame(FrameError::MalformedFrame(_)) => "malformed_frame",
            BridgeError::Text(_) => "invalid_text",
            BridgeError::SendTooLarge { .. } => "send_too_large",
            BridgeError::Transport(_) => "transport",
            BridgeError::ResponseClosed => "response_closed",
        }
    }
}
