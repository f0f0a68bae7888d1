//! Streaming base64 transcoding for the text wire variant.
//!
//! The whole response body (data frames and the trailer frame) is one
//! logical base64 stream. Chunk boundaries from the transport are arbitrary,
//! so both directions carry the partial group over to the next call.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use thiserror::Error;

/// Errors produced by the text transcoder.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TextError {
    /// Input is not valid base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// Encoder was used after `finalize`.
    #[error("text encoder already finalized")]
    Finalized,
}

/// Outbound base64 encoder.
#[derive(Debug, Default)]
pub struct TextEncoder {
    pending: Vec<u8>,
    finished: bool,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode the complete 3-byte groups available, keeping up to two bytes.
    pub fn encode_chunk(&mut self, data: &[u8]) -> Result<Bytes, TextError> {
        if self.finished {
            return Err(TextError::Finalized);
        }

        self.pending.extend_from_slice(data);
        let complete = self.pending.len() / 3 * 3;
        if complete == 0 {
            return Ok(Bytes::new());
        }

        let encoded = STANDARD.encode(&self.pending[..complete]);
        self.pending.drain(..complete);
        Ok(Bytes::from(encoded))
    }

    /// Flush the leftover bytes with padding. Later calls return nothing.
    pub fn finalize(&mut self) -> Bytes {
        if self.finished {
            return Bytes::new();
        }
        self.finished = true;

        if self.pending.is_empty() {
            return Bytes::new();
        }
        let encoded = STANDARD.encode(&self.pending);
        self.pending.clear();
        Bytes::from(encoded)
    }

    pub fn is_finalized(&self) -> bool {
        self.finished
    }
}

/// Inbound base64 decoder.
#[derive(Debug, Default)]
pub struct TextDecoder {
    pending: BytesMut,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete 4-character group, keeping the remainder.
    ///
    /// Padded groups may appear mid-stream when a client encodes each
    /// message separately; each padded segment is decoded on its own.
    pub fn decode_chunk(&mut self, data: &[u8]) -> Result<Bytes, TextError> {
        self.pending.extend_from_slice(data);
        let complete = self.pending.len() / 4 * 4;
        let mut groups = self.pending.split_to(complete);

        let mut out = Vec::with_capacity(complete / 4 * 3);
        while !groups.is_empty() {
            let end = match groups.iter().position(|&b| b == b'=') {
                Some(pos) => (pos / 4 + 1) * 4,
                None => groups.len(),
            };
            let segment = groups.split_to(end);
            STANDARD
                .decode_vec(&segment[..], &mut out)
                .map_err(|e| TextError::InvalidBase64(e.to_string()))?;
        }
        Ok(Bytes::from(out))
    }

    /// Check that the stream ended on a group boundary.
    pub fn finish(&mut self) -> Result<(), TextError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            let leftover = self.pending.len();
            self.pending.clear();
            Err(TextError::InvalidBase64(format!(
                "stream ended with {} dangling characters",
                leftover
            )))
        }
    }
}
