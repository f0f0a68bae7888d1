//! Per-call adapter between a transport byte stream and a dispatcher.
//!
//! # State Machine
//! ```text
//! Init → ReadingRequest → Dispatching → WritingResponse → Completed
//!              │                │               │
//!              │                └──────────────►├──────► Aborted  (non-OK dispatcher status)
//!              └───────────────────────────────►└──────► Failed   (framing / transport fault)
//! ```
//!
//! # Design Decisions
//! - Response headers are held back until the first data frame or the final
//!   status, so an empty response can still carry the status in headers
//! - The status delivery mechanism is fixed when the first data frame is
//!   flushed and never revisited
//! - Transport faults stop all writes; framing faults are still reported

use std::fmt::Display;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use super::error::BridgeError;
use super::frame::{encode_data_frame, Decoded, FrameDecoder};
use super::mode::{EncodingMode, Negotiated};
use super::status::{Code, Metadata, Status, StatusDelivery};
use super::text::{TextDecoder, TextEncoder};
use crate::service::{DispatchResult, Dispatcher};

/// One piece of the response handed to the transport, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    /// Response headers; always the first part sent.
    Headers(Metadata),
    /// Body bytes.
    Data(Bytes),
    /// Transport-native trailers; always the last part when present.
    Trailers(Metadata),
}

/// Lifecycle of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Init,
    ReadingRequest,
    Dispatching,
    WritingResponse,
    Completed,
    Aborted,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Completed | CallState::Aborted | CallState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallState::Init => "init",
            CallState::ReadingRequest => "reading_request",
            CallState::Dispatching => "dispatching",
            CallState::WritingResponse => "writing_response",
            CallState::Completed => "completed",
            CallState::Aborted => "aborted",
            CallState::Failed => "failed",
        }
    }
}

/// Limits and deadline applied to a single call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub max_receive_message_size: Option<usize>,
    pub max_send_message_size: Option<usize>,
    pub deadline: Option<Duration>,
}

/// Everything the adapter needs to know about a call before it starts.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub method: String,
    pub negotiated: Negotiated,
    pub options: CallOptions,
}

/// Final report of a call, for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub state: CallState,
    pub status: Status,
    pub delivery: Option<StatusDelivery>,
    pub data_frames: usize,
    /// Set when the bridge itself ended the call.
    pub failure: Option<&'static str>,
}

enum Inbound {
    Binary,
    Text(TextDecoder),
}

enum Outbound {
    Binary,
    Text(TextEncoder),
}

/// Mutable per-call state, owned by the adapter.
struct CallStreamState {
    state: CallState,
    decoder: FrameDecoder,
    inbound: Inbound,
    outbound: Outbound,
    headers_sent: bool,
    data_frames: usize,
    delivery: Option<StatusDelivery>,
    trailer_sent: bool,
}

/// Drives one call end-to-end.
pub struct CallAdapter {
    ctx: CallContext,
    stream: CallStreamState,
    sink: mpsc::Sender<ResponsePart>,
}

impl CallAdapter {
    pub fn new(ctx: CallContext, sink: mpsc::Sender<ResponsePart>) -> Self {
        let (inbound, outbound) = match ctx.negotiated.mode {
            EncodingMode::Binary => (Inbound::Binary, Outbound::Binary),
            EncodingMode::Text => (
                Inbound::Text(TextDecoder::new()),
                Outbound::Text(TextEncoder::new()),
            ),
        };
        let decoder = match ctx.options.max_receive_message_size {
            Some(limit) => FrameDecoder::with_max_payload(limit),
            None => FrameDecoder::new(),
        };

        Self {
            ctx,
            stream: CallStreamState {
                state: CallState::Init,
                decoder,
                inbound,
                outbound,
                headers_sent: false,
                data_frames: 0,
                delivery: None,
                trailer_sent: false,
            },
            sink,
        }
    }

    pub fn state(&self) -> CallState {
        self.stream.state
    }

    /// Run the call to a terminal state.
    pub async fn run<S, E, D>(mut self, body: S, dispatcher: &D) -> CallOutcome
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
        D: Dispatcher + ?Sized,
    {
        self.transition(CallState::ReadingRequest);
        let request = match self.read_request(body).await {
            Ok(request) => request,
            Err(e) => return self.fail(e).await,
        };

        self.transition(CallState::Dispatching);
        let result = self.dispatch(dispatcher, request).await;

        self.transition(CallState::WritingResponse);
        self.write_response(result).await
    }

    fn transition(&mut self, next: CallState) {
        tracing::trace!(
            method = %self.ctx.method,
            from = self.stream.state.as_str(),
            to = next.as_str(),
            "Call state transition"
        );
        self.stream.state = next;
    }

    async fn read_request<S, E>(&mut self, mut body: S) -> Result<Bytes, BridgeError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let mut message = None;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BridgeError::Transport(e.to_string()))?;
            self.feed(&chunk)?;
            if self.drain_request_frames(&mut message)? {
                break;
            }
        }

        if let Inbound::Text(decoder) = &mut self.stream.inbound {
            decoder.finish()?;
        }
        self.stream.decoder.close();
        self.drain_request_frames(&mut message)?;

        message.ok_or_else(|| BridgeError::MalformedRequest("Incomplete message.".to_string()))
    }

    fn feed(&mut self, chunk: &[u8]) -> Result<(), BridgeError> {
        match &mut self.stream.inbound {
            Inbound::Binary => self.stream.decoder.push(chunk),
            Inbound::Text(decoder) => {
                let decoded = decoder.decode_chunk(chunk)?;
                self.stream.decoder.push(&decoded);
            }
        }
        Ok(())
    }

    /// Pull every complete frame out of the decoder. Returns true at end of stream.
    fn drain_request_frames(&mut self, message: &mut Option<Bytes>) -> Result<bool, BridgeError> {
        loop {
            match self.stream.decoder.decode()? {
                Decoded::Frame(frame) => {
                    if frame.is_trailer() {
                        return Err(BridgeError::MalformedRequest(
                            "Trailer frame received on a request stream.".to_string(),
                        ));
                    }
                    if frame.is_compressed() {
                        return Err(BridgeError::MalformedRequest(
                            "Request sent with compression but no encoding was negotiated."
                                .to_string(),
                        ));
                    }
                    if message.is_some() {
                        return Err(BridgeError::MalformedRequest(
                            "Additional data after the message received.".to_string(),
                        ));
                    }
                    *message = Some(frame.payload);
                }
                Decoded::NeedMoreData => return Ok(false),
                Decoded::EndOfStream => return Ok(true),
            }
        }
    }

    async fn dispatch<D>(&mut self, dispatcher: &D, request: Bytes) -> DispatchResult
    where
        D: Dispatcher + ?Sized,
    {
        let call = dispatcher.invoke(&self.ctx.method, request);
        match self.ctx.options.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(method = %self.ctx.method, ?deadline, "Deadline exceeded");
                    DispatchResult::status_only(Status::new(
                        Code::DeadlineExceeded,
                        "Deadline Exceeded",
                    ))
                }
            },
            None => call.await,
        }
    }

    async fn write_response(mut self, result: DispatchResult) -> CallOutcome {
        for message in &result.messages {
            if let Err(e) = self.write_message(message).await {
                return self.fail(e).await;
            }
        }

        if let Err(e) = self.send_status(&result.status).await {
            return self.fail(e).await;
        }

        let next = if result.status.is_ok() {
            CallState::Completed
        } else {
            CallState::Aborted
        };
        self.transition(next);
        self.outcome(result.status, None)
    }

    async fn write_message(&mut self, message: &[u8]) -> Result<(), BridgeError> {
        if let Some(limit) = self.ctx.options.max_send_message_size {
            if message.len() > limit {
                return Err(BridgeError::SendTooLarge {
                    size: message.len(),
                    limit,
                });
            }
        }

        let frame = encode_data_frame(message)?;
        if self.stream.delivery.is_none() {
            self.stream.delivery = Some(StatusDelivery::select(
                self.ctx.negotiated.supports_native_trailers(),
                true,
            ));
        }
        let headers = self.base_headers();
        self.send_headers(headers).await?;
        self.write_body(&frame).await?;
        self.stream.data_frames += 1;
        Ok(())
    }

    async fn send_status(&mut self, status: &Status) -> Result<(), BridgeError> {
        let delivery = *self.stream.delivery.get_or_insert_with(|| {
            StatusDelivery::select(self.ctx.negotiated.supports_native_trailers(), false)
        });

        match delivery {
            StatusDelivery::HeaderFallback => {
                let mut headers = self.base_headers();
                headers.extend(status.to_header_fallback());
                self.send_headers(headers).await?;
            }
            StatusDelivery::NativeTrailers => {
                self.send(ResponsePart::Trailers(status.to_native_trailers()))
                    .await?;
            }
            StatusDelivery::TrailerFrame => {
                let frame = status.to_trailer_frame()?;
                self.write_body(&frame).await?;
            }
        }
        self.stream.trailer_sent = true;

        if let Outbound::Text(encoder) = &mut self.stream.outbound {
            let tail = encoder.finalize();
            if !tail.is_empty() {
                self.send(ResponsePart::Data(tail)).await?;
            }
        }
        Ok(())
    }

    async fn write_body(&mut self, bytes: &Bytes) -> Result<(), BridgeError> {
        let out = match &mut self.stream.outbound {
            Outbound::Binary => bytes.clone(),
            Outbound::Text(encoder) => encoder.encode_chunk(bytes)?,
        };
        if out.is_empty() {
            return Ok(());
        }
        self.send(ResponsePart::Data(out)).await
    }

    async fn send_headers(&mut self, headers: Metadata) -> Result<(), BridgeError> {
        if self.stream.headers_sent {
            return Ok(());
        }
        self.send(ResponsePart::Headers(headers)).await?;
        self.stream.headers_sent = true;
        Ok(())
    }

    async fn send(&self, part: ResponsePart) -> Result<(), BridgeError> {
        self.sink
            .send(part)
            .await
            .map_err(|_| BridgeError::ResponseClosed)
    }

    fn base_headers(&self) -> Metadata {
        vec![(
            "content-type".to_string(),
            self.ctx.negotiated.response_content_type().to_string(),
        )]
    }

    /// End the call in `Failed`, reporting the error unless the transport is gone.
    async fn fail(mut self, error: BridgeError) -> CallOutcome {
        self.stream.decoder.discard();
        let status = error.to_status();

        if error.is_transport_fault() {
            tracing::warn!(
                method = %self.ctx.method,
                state = self.stream.state.as_str(),
                error = %error,
                "Transport fault, abandoning call"
            );
        } else {
            tracing::warn!(
                method = %self.ctx.method,
                state = self.stream.state.as_str(),
                error = %error,
                "Call failed inside the bridge"
            );
            if !self.stream.trailer_sent {
                if let Err(e) = self.send_status(&status).await {
                    tracing::debug!(method = %self.ctx.method, error = %e, "Could not report failure status");
                }
            }
        }

        self.transition(CallState::Failed);
        self.outcome(status, Some(error.reason()))
    }

    fn outcome(&self, status: Status, failure: Option<&'static str>) -> CallOutcome {
        CallOutcome {
            state: self.stream.state,
            status,
            delivery: self.stream.delivery,
            data_frames: self.stream.data_frames,
            failure,
        }
    }
}
