//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::net::TcpListener;

use grpc_web_bridge::config::BridgeConfig;
use grpc_web_bridge::service::echo::echo_registry;
use grpc_web_bridge::web::{
    encode_data_frame, parse_trailer_block, Decoded, FrameDecoder, Status,
};
use grpc_web_bridge::{HttpServer, Shutdown};

/// EchoRequest { message: "test" } serialized.
pub const TEST_MESSAGE: &[u8] = b"\x0a\x04test";

/// A running bridge bound to an ephemeral port.
pub struct TestBridge {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestBridge {
    pub fn url(&self, method: &str) -> String {
        format!("http://{}/{}", self.addr, method)
    }
}

impl Drop for TestBridge {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the bridge with the echo service.
pub async fn start_bridge() -> TestBridge {
    let mut config = BridgeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.observability.metrics_enabled = false;

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, Arc::new(echo_registry()));
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestBridge { addr, shutdown }
}

/// HTTP version used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http1,
    Http2,
}

/// Client-side wire variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    WebBinary,
    WebText,
    Native,
}

impl Variant {
    pub fn content_type(self) -> &'static str {
        match self {
            Variant::WebBinary => "application/grpc-web",
            Variant::WebText => "application/grpc-web-text",
            Variant::Native => "application/grpc",
        }
    }

    /// Frame a message as a request body.
    pub fn request_body(self, message: &[u8]) -> Bytes {
        let frame = encode_data_frame(message).unwrap();
        match self {
            Variant::WebText => Bytes::from(STANDARD.encode(&frame)),
            _ => frame,
        }
    }
}

/// What came back over the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub trailers: Option<HeaderMap>,
}

impl RawResponse {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|v| v.to_str().ok())
    }
}

/// POST a body to the bridge.
pub async fn post(
    bridge: &TestBridge,
    version: HttpVersion,
    method: &str,
    content_type: &str,
    body: Bytes,
) -> RawResponse {
    match version {
        HttpVersion::Http1 => {
            let client = reqwest::Client::builder()
                .http1_only()
                .no_proxy()
                .build()
                .unwrap();
            let res = client
                .post(bridge.url(method))
                .header("content-type", content_type)
                .body(body)
                .send()
                .await
                .expect("Bridge unreachable");
            let status = res.status().as_u16();
            let headers = res.headers().clone();
            let body = res.bytes().await.unwrap();
            RawResponse {
                status,
                headers,
                body,
                trailers: None,
            }
        }
        HttpVersion::Http2 => {
            let client = Client::builder(TokioExecutor::new())
                .http2_only(true)
                .build_http::<Full<Bytes>>();
            let req = hyper::Request::builder()
                .method("POST")
                .uri(bridge.url(method))
                .header("content-type", content_type)
                .body(Full::new(body))
                .unwrap();
            let res = client.request(req).await.expect("Bridge unreachable");
            let status = res.status().as_u16();
            let headers = res.headers().clone();
            let collected = res.into_body().collect().await.unwrap();
            let trailers = collected.trailers().cloned();
            RawResponse {
                status,
                headers,
                body: collected.to_bytes(),
                trailers,
            }
        }
    }
}

/// Response body split into data-frame payloads and the trailer-frame status.
pub struct ParsedBody {
    pub messages: Vec<Bytes>,
    pub trailer_status: Option<Status>,
}

/// Decode a response body for the given variant.
pub fn parse_body(variant: Variant, body: &[u8]) -> ParsedBody {
    let raw = match variant {
        Variant::WebText => Bytes::from(STANDARD.decode(body).expect("body is not base64")),
        _ => Bytes::copy_from_slice(body),
    };

    let mut decoder = FrameDecoder::new();
    decoder.push(&raw);
    decoder.close();

    let mut messages = Vec::new();
    let mut trailer_status = None;
    loop {
        match decoder.decode().expect("malformed response body") {
            Decoded::Frame(frame) if frame.is_trailer() => {
                assert!(trailer_status.is_none(), "more than one trailer frame");
                trailer_status = parse_trailer_block(&frame.payload);
            }
            Decoded::Frame(frame) => {
                assert!(trailer_status.is_none(), "data frame after trailer frame");
                messages.push(frame.payload);
            }
            Decoded::EndOfStream => break,
            Decoded::NeedMoreData => unreachable!("decoder is closed"),
        }
    }
    ParsedBody {
        messages,
        trailer_status,
    }
}

/// Status carried in a header map.
pub fn status_from_headers(headers: &HeaderMap) -> Option<Status> {
    Status::from_pairs(
        headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v))),
    )
}
