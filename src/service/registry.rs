//! Method registry mapping fully-qualified method names to handlers.
//!
//! Method names take the form `package.Service/Method`, i.e. the request
//! path without its leading slash.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use super::dispatcher::{BoxFuture, DispatchResult, Dispatcher};
use crate::web::status::{Code, Status};

/// Type-erased handler stored in the registry.
trait Handler: Send + Sync + 'static {
    fn call(&self, request: Bytes) -> BoxFuture<'static, DispatchResult>;
}

struct UnaryHandler<F>(F);

impl<F, Fut> Handler for UnaryHandler<F>
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes, Status>> + Send + 'static,
{
    fn call(&self, request: Bytes) -> BoxFuture<'static, DispatchResult> {
        let fut = (self.0)(request);
        Box::pin(async move { DispatchResult::from(fut.await) })
    }
}

struct StreamingHandler<F>(F);

impl<F, Fut> Handler for StreamingHandler<F>
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult> + Send + 'static,
{
    fn call(&self, request: Bytes) -> BoxFuture<'static, DispatchResult> {
        Box::pin((self.0)(request))
    }
}

/// A [`Dispatcher`] backed by a name → handler map.
#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unary method: one response message or an error status.
    pub fn register<F, Fut>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes, Status>> + Send + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(UnaryHandler(handler)));
        self
    }

    /// Register a method producing any number of messages and a final status.
    pub fn register_streaming<F, Fut>(&mut self, method: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult> + Send + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(StreamingHandler(handler)));
        self
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Dispatcher for MethodRegistry {
    fn invoke(&self, method: &str, request: Bytes) -> BoxFuture<'static, DispatchResult> {
        match self.handlers.get(method) {
            Some(handler) => handler.call(request),
            None => {
                tracing::debug!(method = %method, "Method not registered");
                Box::pin(async {
                    DispatchResult::status_only(Status::new(
                        Code::Unimplemented,
                        "Method is unimplemented.",
                    ))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn routes_to_registered_handler() {
        let mut registry = MethodRegistry::new();
        registry.register("pkg.Svc/Upper", |req: Bytes| async move {
            Ok(Bytes::from(req.to_ascii_uppercase()))
        });
        assert!(registry.contains("pkg.Svc/Upper"));

        let result = registry.invoke("pkg.Svc/Upper", Bytes::from("abc")).await;
        assert_eq!(result, DispatchResult::unary(Bytes::from("ABC")));
    }

    #[tokio::test]
    async fn handler_error_becomes_status_only() {
        let mut registry = MethodRegistry::new();
        registry.register("pkg.Svc/Fail", |_req: Bytes| async move {
            Err(Status::new(Code::NotFound, "nope"))
        });

        let result = registry.invoke("pkg.Svc/Fail", Bytes::new()).await;
        assert!(result.messages.is_empty());
        assert_eq!(result.status, Status::new(Code::NotFound, "nope"));
    }

    #[tokio::test]
    async fn unknown_method_is_unimplemented() {
        let registry = MethodRegistry::new();
        let result = registry.invoke("pkg.Svc/Missing", Bytes::new()).await;
        assert_eq!(result.status.code(), Code::Unimplemented);
    }
}
