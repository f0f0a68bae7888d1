//! Dispatcher interface consumed by the call adapter.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::web::status::Status;

/// Boxed future returned by dispatchers and handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of invoking a method: zero or more response messages, then a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    pub messages: Vec<Bytes>,
    pub status: Status,
}

impl DispatchResult {
    /// A single response message with an OK status.
    pub fn unary(message: Bytes) -> Self {
        Self {
            messages: vec![message],
            status: Status::ok(),
        }
    }

    /// No messages, only a terminal status.
    pub fn status_only(status: Status) -> Self {
        Self {
            messages: Vec::new(),
            status,
        }
    }
}

impl From<Result<Bytes, Status>> for DispatchResult {
    fn from(result: Result<Bytes, Status>) -> Self {
        match result {
            Ok(message) => DispatchResult::unary(message),
            Err(status) => DispatchResult::status_only(status),
        }
    }
}

/// Executes RPC methods on behalf of the bridge.
pub trait Dispatcher: Send + Sync + 'static {
    fn invoke(&self, method: &str, request: Bytes) -> BoxFuture<'static, DispatchResult>;
}
