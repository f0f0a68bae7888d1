//! Length-prefixed message framing.
//!
//! # Frame Layout
//! ```text
//! [flags:1][length:4 big-endian][payload:length]
//! ```
//!
//! Flags:
//! - `0x00`: data frame carrying one serialized message
//! - `0x01`: compressed data frame (never produced, rejected on requests)
//! - `0x80`: trailer frame carrying `key: value\r\n` status pairs
//!
//! # Design Decisions
//! - Decoding is pull-based: [`FrameDecoder::decode`] returns
//!   [`Decoded::NeedMoreData`] instead of blocking, so the caller owns I/O
//! - The decoder only reports truncation once it is told the stream closed

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the frame header (flags + length).
pub const FRAME_HEADER_SIZE: usize = 5;

/// Flag bit marking a compressed data frame.
pub const FLAG_COMPRESSED: u8 = 0x01;

/// Flag bit marking a trailer frame.
pub const FLAG_TRAILER: u8 = 0x80;

/// Errors produced by the frame codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Payload length cannot be represented in the 32-bit length field.
    #[error("frame payload of {0} bytes exceeds the 32-bit length field")]
    FrameTooLarge(usize),

    /// Frame is truncated or carries invalid flags.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame payload exceeds the configured message size limit.
    #[error("message of {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },
}

/// A fully decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw flag byte.
    pub flags: u8,
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Whether the trailer bit is set.
    pub fn is_trailer(&self) -> bool {
        self.flags & FLAG_TRAILER != 0
    }

    /// Whether the compression bit is set.
    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }
}

/// Result of a single decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete frame was consumed from the buffer.
    Frame(Frame),
    /// Not enough bytes buffered yet; push more and retry.
    NeedMoreData,
    /// The stream is closed and nothing is buffered.
    EndOfStream,
}

fn put_header(buf: &mut BytesMut, flags: u8, len: usize) -> Result<(), FrameError> {
    let len = u32::try_from(len).map_err(|_| FrameError::FrameTooLarge(len))?;
    buf.put_u8(flags);
    buf.put_u32(len);
    Ok(())
}

/// Encode a data frame around an opaque message payload.
pub fn encode_data_frame(payload: &[u8]) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    put_header(&mut buf, 0x00, payload.len())?;
    buf.extend_from_slice(payload);
    Ok(buf.freeze())
}

/// Encode a trailer frame from ordered `(key, value)` pairs.
pub fn encode_trailer_frame<K, V>(pairs: &[(K, V)]) -> Result<Bytes, FrameError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut block = BytesMut::new();
    for (key, value) in pairs {
        block.extend_from_slice(key.as_ref().as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(value.as_ref().as_bytes());
        block.extend_from_slice(b"\r\n");
    }

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + block.len());
    put_header(&mut buf, FLAG_TRAILER, block.len())?;
    buf.extend_from_slice(&block);
    Ok(buf.freeze())
}

/// Resumable frame parser fed with bytes as they arrive.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload: Option<usize>,
    closed: bool,
}

impl FrameDecoder {
    /// Create a decoder without a payload limit.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            max_payload: None,
            closed: false,
        }
    }

    /// Create a decoder that rejects payloads larger than `limit`.
    pub fn with_max_payload(limit: usize) -> Self {
        Self {
            max_payload: Some(limit),
            ..Self::new()
        }
    }

    /// Append freshly received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Mark the underlying stream as permanently closed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any buffered partial frame.
    pub fn discard(&mut self) {
        self.buffer.clear();
    }

    /// Try to consume one frame from the buffer.
    pub fn decode(&mut self) -> Result<Decoded, FrameError> {
        if self.buffer.len() < FRAME_HEADER_SIZE {
            return self.incomplete("header");
        }

        let flags = self.buffer[0];
        if flags & !(FLAG_TRAILER | FLAG_COMPRESSED) != 0 {
            return Err(FrameError::MalformedFrame(format!(
                "unknown flag bits 0x{:02x}",
                flags
            )));
        }
        if flags == FLAG_TRAILER | FLAG_COMPRESSED {
            return Err(FrameError::MalformedFrame(
                "trailer frame cannot be compressed".to_string(),
            ));
        }

        let len = u32::from_be_bytes([
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
            self.buffer[4],
        ]) as usize;

        if let Some(limit) = self.max_payload {
            if len > limit {
                return Err(FrameError::MessageTooLarge { size: len, limit });
            }
        }

        if self.buffer.len() < FRAME_HEADER_SIZE + len {
            return self.incomplete("payload");
        }

        self.buffer.advance(FRAME_HEADER_SIZE);
        let payload = self.buffer.split_to(len).freeze();
        Ok(Decoded::Frame(Frame { flags, payload }))
    }

    fn incomplete(&self, part: &str) -> Result<Decoded, FrameError> {
        if !self.closed {
            return Ok(Decoded::NeedMoreData);
        }
        if self.buffer.is_empty() {
            return Ok(Decoded::EndOfStream);
        }
        Err(FrameError::MalformedFrame(format!(
            "stream closed with {} bytes of incomplete {}",
            self.buffer.len(),
            part
        )))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
