//! HTTP transport binding.
//!
//! # Data Flow
//! ```text
//! TCP connection (HTTP/1.1 or HTTP/2, auto-detected)
//!     → server.rs (Axum setup, content negotiation)
//!     → request.rs (request ID, deadline header)
//!     → web::call (one adapter task per call)
//!     → response.rs (response parts → HTTP headers, body frames, trailers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use server::HttpServer;
