//! Client stream contracts.
//!
//! A [`ClientStream`] is the per-call handle a channel drives: it is started
//! with a [`ClientStreamListener`], then receives outbound operations in
//! order. Transports produce real streams; this crate adds the
//! [`DeferredStream`](crate::credentials::DeferredStream) gate and the
//! terminal [`FailingClientStream`].

use std::sync::Arc;

use bytes::Bytes;

use crate::grpc::{Attributes, GrpcMetadata, GrpcStatus};

/// How far an RPC progressed before it was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RpcProgress {
    /// The RPC was processed by the server or by a local decision.
    #[default]
    Processed,
    /// The RPC was refused before reaching the server application.
    Refused,
    /// The RPC was dropped by the load balancer.
    Dropped,
}

/// Receives inbound events for one stream.
///
/// `closed` is delivered exactly once and is always the last event.
pub trait ClientStreamListener: Send + Sync {
    /// Response headers were received.
    fn headers_read(&self, _headers: &GrpcMetadata) {}

    /// A response message was received.
    fn message_received(&self, _message: Bytes) {}

    /// The stream became ready to accept more outbound messages.
    fn on_ready(&self) {}

    /// The stream is closed with a final status.
    fn closed(&self, status: GrpcStatus, progress: RpcProgress, trailers: GrpcMetadata);
}

/// Instrumentation hooks attached to a stream.
pub trait ClientStreamTracer: Send + Sync {
    /// The transport created the real stream.
    fn stream_created(&self, _transport_attrs: &Attributes, _headers: &GrpcMetadata) {}

    /// An outbound message with the given sequence number was sent.
    fn outbound_message(&self, _seq_no: u64) {}

    /// The stream closed with the given status.
    fn stream_closed(&self, _status: &GrpcStatus) {}
}

/// The outbound half of a client-side RPC stream.
///
/// Methods take `&self`: streams are shared between the thread that drives the
/// call and the thread that resolves it.
pub trait ClientStream: Send + Sync {
    /// Start the stream. Must be called before any other operation.
    fn start(&self, listener: Arc<dyn ClientStreamListener>);

    /// Queue an outbound message.
    fn write_message(&self, message: Bytes);

    /// Flush queued messages to the wire.
    fn flush(&self);

    /// Ask for up to `num_messages` more inbound messages.
    fn request(&self, num_messages: u32);

    /// Close the outbound side; no more messages will be written.
    fn half_close(&self);

    /// Enable or disable compression of outbound messages.
    fn set_message_compression(&self, enable: bool);

    /// Abnormally terminate the stream with `reason`.
    fn cancel(&self, reason: GrpcStatus);

    /// Whether the stream can accept a message without excessive buffering.
    fn is_ready(&self) -> bool;

    /// Attributes of the stream.
    fn attributes(&self) -> Attributes;
}

/// A stream that has already failed.
///
/// Starting it reports `status` to every tracer and then closes the listener.
/// Every other operation is ignored.
pub struct FailingClientStream {
    status: GrpcStatus,
    progress: RpcProgress,
    tracers: Vec<Arc<dyn ClientStreamTracer>>,
}

impl FailingClientStream {
    /// Create a failing stream. `status` must not be OK.
    pub fn new(status: GrpcStatus, tracers: Vec<Arc<dyn ClientStreamTracer>>) -> Self {
        debug_assert!(!status.is_ok(), "error must not be OK");
        Self {
            status,
            progress: RpcProgress::Processed,
            tracers,
        }
    }

    /// Set the progress reported to the listener.
    pub fn with_progress(mut self, progress: RpcProgress) -> Self {
        self.progress = progress;
        self
    }

    /// The terminal status.
    pub fn status(&self) -> &GrpcStatus {
        &self.status
    }
}

impl ClientStream for FailingClientStream {
    fn start(&self, listener: Arc<dyn ClientStreamListener>) {
        for tracer in &self.tracers {
            tracer.stream_closed(&self.status);
        }
        listener.closed(self.status.clone(), self.progress, GrpcMetadata::new());
    }

    fn write_message(&self, _message: Bytes) {}

    fn flush(&self) {}

    fn request(&self, _num_messages: u32) {}

    fn half_close(&self) {}

    fn set_message_compression(&self, _enable: bool) {}

    fn cancel(&self, _reason: GrpcStatus) {}

    fn is_ready(&self) -> bool {
        false
    }

    fn attributes(&self) -> Attributes {
        Attributes::empty()
    }
}

impl std::fmt::Debug for FailingClientStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailingClientStream")
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("tracers", &self.tracers.len())
            .finish()
    }
}
