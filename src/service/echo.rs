//! Echo test service used by the demo binary and integration tests.
//!
//! Echo messages are treated as opaque bytes: the request and response
//! message types share the same layout, so echoing the bytes echoes the
//! message.

use bytes::Bytes;

use super::dispatcher::DispatchResult;
use super::registry::MethodRegistry;
use crate::web::status::{Code, Status};

pub const SERVICE: &str = "grpc.gateway.testing.EchoService";

/// Message used by the abort methods.
pub const ABORT_MESSAGE: &str = "Aborted from server side.";

/// Number of copies sent by `ServerStreamingEcho`.
pub const STREAM_COUNT: usize = 3;

fn method(name: &str) -> String {
    format!("{}/{}", SERVICE, name)
}

/// Register the echo service methods.
pub fn register(registry: &mut MethodRegistry) {
    registry
        .register(method("Echo"), |req: Bytes| async move { Ok(req) })
        .register(method("EchoAbort"), |_req: Bytes| async move {
            Err(Status::new(Code::Aborted, ABORT_MESSAGE))
        })
        .register(method("NoOp"), |_req: Bytes| async move { Ok(Bytes::new()) })
        .register_streaming(method("ServerStreamingEcho"), |req: Bytes| async move {
            DispatchResult {
                messages: vec![req; STREAM_COUNT],
                status: Status::ok(),
            }
        })
        .register_streaming(method("ServerStreamingEchoAbort"), |req: Bytes| async move {
            DispatchResult {
                messages: vec![req],
                status: Status::new(Code::Aborted, ABORT_MESSAGE),
            }
        });
}

/// A registry containing only the echo service.
pub fn echo_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();
    register(&mut registry);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Dispatcher;

    #[tokio::test]
    async fn echo_returns_request() {
        let registry = echo_registry();
        let result = registry
            .invoke("grpc.gateway.testing.EchoService/Echo", Bytes::from_static(b"\x0a\x04test"))
            .await;
        assert_eq!(result, DispatchResult::unary(Bytes::from_static(b"\x0a\x04test")));
    }

    #[tokio::test]
    async fn abort_has_no_messages() {
        let registry = echo_registry();
        let result = registry
            .invoke("grpc.gateway.testing.EchoService/EchoAbort", Bytes::new())
            .await;
        assert!(result.messages.is_empty());
        assert_eq!(result.status.code(), Code::Aborted);
        assert_eq!(result.status.message(), Some(ABORT_MESSAGE));
    }
}
