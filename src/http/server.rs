//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the RPC handler
//! - Serve HTTP/1.1 and HTTP/2 on the same listener
//! - Wire up middleware (tracing, request ID)
//! - Negotiate protocol and encoding per request
//! - Spawn one call adapter task per RPC call
//! - Observability (metrics, request IDs)

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, Version},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::BridgeConfig;
use crate::http::{request, response};
use crate::observability::metrics;
use crate::service::Dispatcher;
use crate::web::{CallAdapter, CallContext, Negotiated, WireProtocol};

/// Response parts buffered between the call task and the HTTP body.
const RESPONSE_BUFFER: usize = 16;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn Dispatcher>,
    pub config: Arc<BridgeConfig>,
}

/// HTTP server fronting a dispatcher.
pub struct HttpServer {
    router: Router,
    config: BridgeConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: BridgeConfig, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let state = AppState {
            dispatcher,
            config: Arc::new(config.clone()),
        };
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// There is no timeout layer: call deadlines are enforced by the call
    /// adapter so that an expired call still answers 200 with a status.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", post(rpc_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(request::set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(request::propagate_request_id_layer()),
            )
    }

    /// The router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            accept_native = self.config.grpc.accept_native,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Handles every RPC call: negotiate, spawn the adapter, stream the response.
async fn rpc_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request::request_id(req.extensions());
    let method = req.uri().path().trim_start_matches('/').to_string();

    let negotiated = match Negotiated::from_content_type(request::content_type(req.headers())) {
        Some(n) => n,
        None => {
            tracing::debug!(request_id = %request_id, method = %method, "Unsupported content type");
            return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported content type").into_response();
        }
    };

    if negotiated.protocol == WireProtocol::Native {
        if !state.config.grpc.accept_native {
            return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Native calls are disabled").into_response();
        }
        if req.version() != Version::HTTP_2 {
            tracing::debug!(
                request_id = %request_id,
                version = ?req.version(),
                "Native call over non-HTTP/2 transport"
            );
            return (StatusCode::UPGRADE_REQUIRED, "Native calls require HTTP/2").into_response();
        }
    }

    let ctx = CallContext {
        method: method.clone(),
        negotiated,
        options: state.config.call_options(request::deadline(req.headers())),
    };

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        mode = negotiated.mode.as_str(),
        version = ?req.version(),
        "Starting call"
    );

    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
    let body = req.into_body().into_data_stream();
    let dispatcher = Arc::clone(&state.dispatcher);

    tokio::spawn(async move {
        let outcome = CallAdapter::new(ctx, tx).run(body, dispatcher.as_ref()).await;
        metrics::record_call(&method, negotiated.mode, &outcome, start);
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            state = outcome.state.as_str(),
            code = %outcome.status.code(),
            data_frames = outcome.data_frames,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Call finished"
        );
    });

    response::from_call(rx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::echo::echo_registry;
    use crate::service::{DispatchResult, MethodRegistry};
    use crate::web::frame::encode_data_frame;
    use crate::web::Status;
    use axum::http::header;
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = BridgeConfig::default();
        config.observability.metrics_enabled = false;
        HttpServer::new(config, Arc::new(echo_registry()))
    }

    #[tokio::test]
    async fn rejects_unknown_content_type() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/grpc.gateway.testing.EchoService/Echo")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn rejects_get() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/grpc.gateway.testing.EchoService/Echo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn native_over_http1_needs_upgrade() {
        let response = server()
            .router()
            .oneshot(
                Request::post("/grpc.gateway.testing.EchoService/Echo")
                    .header(header::CONTENT_TYPE, "application/grpc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn in_process_web_echo() {
        let frame = encode_data_frame(b"\x0a\x04test").unwrap();
        let response = server()
            .router()
            .oneshot(
                Request::post("/grpc.gateway.testing.EchoService/Echo")
                    .header(header::CONTENT_TYPE, "application/grpc-web+proto")
                    .body(Body::from(frame.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/grpc-web");
        assert!(response.headers().contains_key("x-request-id"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.starts_with(&frame));
        assert_eq!(&body[frame.len()..frame.len() + 1], &[0x80]);
    }

    #[tokio::test]
    async fn slow_call_answers_deadline_exceeded_with_200() {
        let mut registry = MethodRegistry::new();
        registry.register("pkg.Slow/Call", |req: Bytes| async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            Ok(req)
        });

        let mut config = BridgeConfig::default();
        config.observability.metrics_enabled = false;
        config.timeouts.request_secs = 1;
        let server = HttpServer::new(config, Arc::new(registry));

        let response = server
            .router()
            .oneshot(
                Request::post("/pkg.Slow/Call")
                    .header(header::CONTENT_TYPE, "application/grpc-web")
                    .header("grpc-timeout", "10S")
                    .body(Body::from(encode_data_frame(b"slow").unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["grpc-status"], "4");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn native_send_limit_after_data_goes_to_trailers() {
        let mut registry = MethodRegistry::new();
        registry.register_streaming("pkg.Stream/Call", |_req: Bytes| async move {
            DispatchResult {
                messages: vec![Bytes::from_static(b"ab"), Bytes::from_static(b"abcdefgh")],
                status: Status::ok(),
            }
        });

        let mut config = BridgeConfig::default();
        config.observability.metrics_enabled = false;
        config.grpc.max_send_message_size = Some(4);
        let server = HttpServer::new(config, Arc::new(registry));

        let response = server
            .router()
            .oneshot(
                Request::post("/pkg.Stream/Call")
                    .version(Version::HTTP_2)
                    .header(header::CONTENT_TYPE, "application/grpc")
                    .body(Body::from(encode_data_frame(b"go").unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("grpc-status").is_none());

        let collected = response.into_body().collect().await.unwrap();
        let trailers = collected.trailers().cloned().unwrap();
        assert_eq!(trailers["grpc-status"], "8");
        assert_eq!(collected.to_bytes(), encode_data_frame(b"ab").unwrap());
    }
}
