//! Browser-compatible RPC bridge.
//!
//! # Data Flow
//! ```text
//! transport bytes
//!     → text.rs (base64 decode, text mode only)
//!     → frame.rs (length-prefixed frame parsing)
//!     → call.rs (unary request validation, dispatch)
//!     → frame.rs (data frame encoding)
//!     → status.rs (trailer frame, native trailers or header fallback)
//!     → text.rs (base64 encode + final padding, text mode only)
//!     → transport bytes / headers / trailers
//! ```
//!
//! # Design Decisions
//! - Encoding mode is negotiated once per call (mode.rs) and stored as a
//!   tagged variant, never re-evaluated per chunk
//! - Base64 applies to the aggregate body stream, not to individual frames
//! - Calls share no mutable state; each adapter owns its buffers

pub mod call;
pub mod error;
pub mod frame;
pub mod mode;
pub mod status;
pub mod text;

pub use call::{CallAdapter, CallContext, CallOptions, CallOutcome, CallState, ResponsePart};
pub use error::BridgeError;
pub use frame::{encode_data_frame, encode_trailer_frame, Decoded, Frame, FrameDecoder, FrameError};
pub use mode::{EncodingMode, Negotiated, WireProtocol};
pub use status::{parse_trailer_block, Code, Metadata, Status, StatusDelivery};
pub use text::{TextDecoder, TextEncoder, TextError};
