//! Call status and its delivery to the client.
//!
//! # Delivery Table
//! ```text
//! data frame written? | native trailers? | mechanism
//! --------------------+------------------+-------------------------
//! no                  | any              | HeaderFallback
//! yes                 | yes              | NativeTrailers
//! yes                 | no               | TrailerFrame (in body)
//! ```
//!
//! All three mechanisms carry the same ordered pairs: `grpc-status` always,
//! `grpc-message` only when the code is not OK.

use bytes::Bytes;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use super::frame::{encode_trailer_frame, FrameError};

/// Key carrying the numeric status code.
pub const STATUS_CODE_KEY: &str = "grpc-status";

/// Key carrying the status message.
pub const STATUS_MESSAGE_KEY: &str = "grpc-message";

/// Bytes escaped in `grpc-message`; non-ASCII is always escaped.
const MESSAGE_ENCODE_SET: &AsciiSet = &CONTROLS.add(b'%');

/// Ordered header or trailer pairs.
pub type Metadata = Vec<(String, String)>;

/// RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Map a raw wire value, falling back to `Unknown`.
    pub fn from_i32(value: i32) -> Code {
        match value {
            0 => Code::Ok,
            1 => Code::Cancelled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "Cancelled",
            Code::Unknown => "Unknown",
            Code::InvalidArgument => "InvalidArgument",
            Code::DeadlineExceeded => "DeadlineExceeded",
            Code::NotFound => "NotFound",
            Code::AlreadyExists => "AlreadyExists",
            Code::PermissionDenied => "PermissionDenied",
            Code::ResourceExhausted => "ResourceExhausted",
            Code::FailedPrecondition => "FailedPrecondition",
            Code::Aborted => "Aborted",
            Code::OutOfRange => "OutOfRange",
            Code::Unimplemented => "Unimplemented",
            Code::Internal => "Internal",
            Code::Unavailable => "Unavailable",
            Code::DataLoss => "DataLoss",
            Code::Unauthenticated => "Unauthenticated",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a call. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: Code,
    message: Option<String>,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn ok() -> Self {
        Self {
            code: Code::Ok,
            message: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    /// Status pairs in wire order.
    pub fn to_pairs(&self) -> Metadata {
        let mut pairs = vec![(STATUS_CODE_KEY.to_string(), self.code.as_i32().to_string())];
        if !self.is_ok() {
            let message = self.message.as_deref().unwrap_or_default();
            pairs.push((
                STATUS_MESSAGE_KEY.to_string(),
                utf8_percent_encode(message, MESSAGE_ENCODE_SET).to_string(),
            ));
        }
        pairs
    }

    /// Status encoded as an in-body trailer frame.
    pub fn to_trailer_frame(&self) -> Result<Bytes, FrameError> {
        encode_trailer_frame(&self.to_pairs())
    }

    /// Status as transport-native trailers.
    pub fn to_native_trailers(&self) -> Metadata {
        self.to_pairs()
    }

    /// Status as response headers, used when no data frame was written.
    pub fn to_header_fallback(&self) -> Metadata {
        self.to_pairs()
    }

    /// Rebuild a status from header or trailer pairs.
    ///
    /// Returns `None` when no status code is present. Keys are compared
    /// case-insensitively.
    pub fn from_pairs<'a, I>(pairs: I) -> Option<Status>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut code = None;
        let mut message = None;
        for (key, value) in pairs {
            if key.eq_ignore_ascii_case(STATUS_CODE_KEY) {
                code = value.trim().parse::<i32>().ok().map(Code::from_i32);
            } else if key.eq_ignore_ascii_case(STATUS_MESSAGE_KEY) {
                message = Some(percent_decode_str(value.trim()).decode_utf8_lossy().into_owned());
            }
        }

        let code = code?;
        Some(match (code, message) {
            (Code::Ok, _) => Status::ok(),
            (code, Some(message)) => Status::new(code, message),
            (code, None) => Status { code, message: None },
        })
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "status {}: {}", self.code, message),
            None => write!(f, "status {}", self.code),
        }
    }
}

/// Parse a trailer frame payload (`key: value\r\n` lines) into a status.
pub fn parse_trailer_block(block: &[u8]) -> Option<Status> {
    let text = std::str::from_utf8(block).ok()?;
    let pairs = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'));
    Status::from_pairs(pairs)
}

/// How the terminal status reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusDelivery {
    /// In-body trailer frame.
    TrailerFrame,
    /// Transport trailers.
    NativeTrailers,
    /// Response headers on an empty body.
    HeaderFallback,
}

impl StatusDelivery {
    /// Pick the mechanism for the current state of the response.
    pub fn select(supports_native_trailers: bool, data_written: bool) -> StatusDelivery {
        match (data_written, supports_native_trailers) {
            (false, _) => StatusDelivery::HeaderFallback,
            (true, true) => StatusDelivery::NativeTrailers,
            (true, false) => StatusDelivery::TrailerFrame,
        }
    }
}
