//! Service dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! web::call (decoded request message)
//!     → Dispatcher::invoke(method, bytes)
//!     → registry.rs (method lookup)
//!     → handler future (business logic, opaque bytes)
//!     → DispatchResult { messages, status }
//!     → web::call (framing + status delivery)
//! ```
//!
//! # Design Decisions
//! - Message payloads stay opaque; serialization belongs to the handler
//! - The dispatcher's status is authoritative for OK vs. non-OK
//! - Unknown methods resolve to `Unimplemented`, never to a transport error

pub mod dispatcher;
pub mod echo;
pub mod registry;

pub use dispatcher::{BoxFuture, DispatchResult, Dispatcher};
pub use registry::MethodRegistry;
