//! Browser-compatible RPC bridge library.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod service;
pub mod web;

pub use config::BridgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::{DispatchResult, Dispatcher, MethodRegistry};
