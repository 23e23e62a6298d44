//! A stream handle that exists before its real stream does.
//!
//! [`DeferredStream`] is returned to the caller as soon as a call is created.
//! Operations issued before the real stream is known are buffered in order;
//! resolution (exactly once) replays them against either the transport's
//! stream or a [`FailingClientStream`].
//!
//! ```text
//!            resolve(real)            buffer empty
//! Pending ─────────────────▶ Draining ─────────────▶ PassThrough
//!    │                          ▲ ops issued while draining
//!    │ cancel(reason)           │ are still buffered
//!    ▼
//! Cancelled (sticky): buffer discarded, listener closed with `reason`,
//!                     the real stream is cancelled when it arrives
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use credgate_core::PerfSpan;
use credgate_core::logging::{span_names, targets};
use parking_lot::Mutex;

use crate::error::GateError;
use crate::grpc::{
    Attributes, ClientStream, ClientStreamListener, ClientStreamTracer, FailingClientStream,
    GrpcMetadata, GrpcStatus, RpcProgress,
};

/// Observable state of a [`DeferredStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for resolution; operations are buffered.
    Pending,
    /// Backed by a real transport stream.
    Resolved,
    /// Resolved to a terminal failure.
    Failed(GrpcStatus),
    /// Cancelled by the caller before resolution.
    Cancelled(GrpcStatus),
}

/// An operation recorded while the real stream is unknown.
enum PendingOp {
    Start(Arc<dyn ClientStreamListener>),
    WriteMessage(Bytes),
    Flush,
    Request(u32),
    HalfClose,
    SetMessageCompression(bool),
    Cancel(GrpcStatus),
}

impl PendingOp {
    fn apply(self, stream: &dyn ClientStream) {
        match self {
            Self::Start(listener) => stream.start(listener),
            Self::WriteMessage(message) => stream.write_message(message),
            Self::Flush => stream.flush(),
            Self::Request(num_messages) => stream.request(num_messages),
            Self::HalfClose => stream.half_close(),
            Self::SetMessageCompression(enable) => stream.set_message_compression(enable),
            Self::Cancel(reason) => stream.cancel(reason),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::WriteMessage(_) => "write_message",
            Self::Flush => "flush",
            Self::Request(_) => "request",
            Self::HalfClose => "half_close",
            Self::SetMessageCompression(_) => "set_message_compression",
            Self::Cancel(_) => "cancel",
        }
    }
}

enum Phase {
    Pending,
    Draining(Arc<dyn ClientStream>),
    PassThrough(Arc<dyn ClientStream>),
}

struct GateInner {
    phase: Phase,
    pending: Vec<PendingOp>,
    /// Set by a cancel issued while pending; never cleared.
    cancelled: Option<GrpcStatus>,
    /// Set when resolved to a failing stream.
    failure: Option<GrpcStatus>,
}

struct Shared {
    resolved: AtomicBool,
    inner: Mutex<GateInner>,
}

/// A client stream whose real stream is supplied later, exactly once.
///
/// Clones share the same gate. Two parties use it concurrently: the caller
/// driving the stream, and the resolver supplying the real stream.
#[derive(Clone)]
pub struct DeferredStream {
    shared: Arc<Shared>,
}

impl Default for DeferredStream {
    fn default() -> Self {
        Self::new()
    }
}

impl DeferredStream {
    /// Create a pending stream.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                resolved: AtomicBool::new(false),
                inner: Mutex::new(GateInner {
                    phase: Phase::Pending,
                    pending: Vec::new(),
                    cancelled: None,
                    failure: None,
                }),
            }),
        }
    }

    /// Resolve to `stream` and replay buffered operations against it in the
    /// order they were issued.
    ///
    /// If the caller cancelled while pending, the only operation `stream`
    /// receives is that cancellation.
    pub fn resolve(&self, stream: Arc<dyn ClientStream>) -> Result<(), GateError> {
        self.set_stream(stream, None)
    }

    /// Resolve to a terminal failure.
    ///
    /// A started listener is closed with `status`, as is any listener started
    /// later. Every other operation is discarded.
    pub fn fail(
        &self,
        status: GrpcStatus,
        tracers: Vec<Arc<dyn ClientStreamTracer>>,
    ) -> Result<(), GateError> {
        let failing = Arc::new(FailingClientStream::new(status.clone(), tracers));
        self.set_stream(failing, Some(status))
    }

    /// The current state of the gate.
    pub fn state(&self) -> GateState {
        let inner = self.shared.inner.lock();
        if let Some(reason) = &inner.cancelled {
            return GateState::Cancelled(reason.clone());
        }
        match (&inner.phase, &inner.failure) {
            (Phase::Pending, _) => GateState::Pending,
            (_, Some(status)) => GateState::Failed(status.clone()),
            (_, None) => GateState::Resolved,
        }
    }

    /// Whether a resolution has been claimed.
    pub fn is_resolved(&self) -> bool {
        self.shared.resolved.load(Ordering::Acquire)
    }

    fn set_stream(
        &self,
        stream: Arc<dyn ClientStream>,
        failure: Option<GrpcStatus>,
    ) -> Result<(), GateError> {
        if self
            .shared
            .resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                target: targets::GATE,
                failure = failure.is_some(),
                "Ignoring second resolution of deferred stream"
            );
            return Err(GateError::AlreadyResolved);
        }

        let cancelled = {
            let mut inner = self.shared.inner.lock();
            inner.failure = failure;
            match inner.cancelled.clone() {
                Some(reason) => {
                    inner.phase = Phase::PassThrough(stream.clone());
                    Some(reason)
                }
                None => {
                    inner.phase = Phase::Draining(stream.clone());
                    None
                }
            }
        };

        match cancelled {
            Some(reason) => {
                tracing::debug!(
                    target: targets::GATE,
                    "Deferred stream was cancelled while pending; cancelling resolved stream"
                );
                stream.cancel(reason);
            }
            None => self.drain(stream),
        }
        Ok(())
    }

    /// Replay buffered operations until the buffer stays empty, then switch
    /// to pass-through. Operations issued during replay join the buffer.
    fn drain(&self, stream: Arc<dyn ClientStream>) {
        let _span = PerfSpan::new(span_names::REPLAY);
        let mut replayed = 0usize;
        loop {
            let batch = {
                let mut inner = self.shared.inner.lock();
                if inner.pending.is_empty() {
                    inner.phase = Phase::PassThrough(stream.clone());
                    break;
                }
                std::mem::take(&mut inner.pending)
            };
            for op in batch {
                replayed += 1;
                op.apply(stream.as_ref());
            }
        }
        tracing::debug!(target: targets::GATE, replayed, "Deferred stream resolved");
    }

    fn delay_or_execute(&self, op: PendingOp) {
        let mut inner = self.shared.inner.lock();

        if let Some(reason) = inner.cancelled.clone() {
            drop(inner);
            match op {
                PendingOp::Start(listener) => {
                    listener.closed(reason, RpcProgress::Processed, GrpcMetadata::new());
                }
                other => {
                    tracing::trace!(target: targets::GATE, op = other.name(), "Dropping operation on cancelled stream");
                }
            }
            return;
        }

        match &inner.phase {
            Phase::PassThrough(real) => {
                let real = real.clone();
                drop(inner);
                op.apply(real.as_ref());
            }
            Phase::Pending | Phase::Draining(_) => {
                tracing::trace!(target: targets::GATE, op = op.name(), "Buffering operation");
                inner.pending.push(op);
            }
        }
    }
}

impl ClientStream for DeferredStream {
    fn start(&self, listener: Arc<dyn ClientStreamListener>) {
        self.delay_or_execute(PendingOp::Start(listener));
    }

    fn write_message(&self, message: Bytes) {
        self.delay_or_execute(PendingOp::WriteMessage(message));
    }

    fn flush(&self) {
        self.delay_or_execute(PendingOp::Flush);
    }

    fn request(&self, num_messages: u32) {
        self.delay_or_execute(PendingOp::Request(num_messages));
    }

    fn half_close(&self) {
        self.delay_or_execute(PendingOp::HalfClose);
    }

    fn set_message_compression(&self, enable: bool) {
        self.delay_or_execute(PendingOp::SetMessageCompression(enable));
    }

    fn cancel(&self, reason: GrpcStatus) {
        let mut inner = self.shared.inner.lock();
        if inner.cancelled.is_some() {
            return;
        }

        match &inner.phase {
            Phase::PassThrough(real) => {
                let real = real.clone();
                drop(inner);
                real.cancel(reason);
            }
            Phase::Draining(_) => {
                inner.pending.push(PendingOp::Cancel(reason));
            }
            Phase::Pending => {
                inner.cancelled = Some(reason.clone());
                let discarded = std::mem::take(&mut inner.pending);
                drop(inner);

                tracing::debug!(
                    target: targets::GATE,
                    discarded = discarded.len(),
                    "Deferred stream cancelled before resolution"
                );
                for op in discarded {
                    if let PendingOp::Start(listener) = op {
                        listener.closed(reason.clone(), RpcProgress::Processed, GrpcMetadata::new());
                    }
                }
            }
        }
    }

    fn is_ready(&self) -> bool {
        let inner = self.shared.inner.lock();
        if inner.cancelled.is_some() {
            return false;
        }
        match &inner.phase {
            Phase::PassThrough(real) => {
                let real = real.clone();
                drop(inner);
                real.is_ready()
            }
            _ => false,
        }
    }

    fn attributes(&self) -> Attributes {
        let inner = self.shared.inner.lock();
        match &inner.phase {
            Phase::PassThrough(real) | Phase::Draining(real) => {
                let real = real.clone();
                drop(inner);
                real.attributes()
            }
            Phase::Pending => Attributes::empty(),
        }
    }
}

impl fmt::Debug for DeferredStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredStream")
            .field("state", &self.state())
            .finish()
    }
}

static_assertions::assert_impl_all!(DeferredStream: ClientStream, Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grpc::GrpcStatusCode;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start,
        Write(Bytes),
        Flush,
        Request(u32),
        HalfClose,
        Compression(bool),
        Cancel(GrpcStatusCode),
    }

    #[derive(Default)]
    struct RecordingStream {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingStream {
        fn events(&self) -> Vec<Event> {
            self.events.lock().clone()
        }
    }

    impl ClientStream for RecordingStream {
        fn start(&self, _listener: Arc<dyn ClientStreamListener>) {
            self.events.lock().push(Event::Start);
        }
        fn write_message(&self, message: Bytes) {
            self.events.lock().push(Event::Write(message));
        }
        fn flush(&self) {
            self.events.lock().push(Event::Flush);
        }
        fn request(&self, num_messages: u32) {
            self.events.lock().push(Event::Request(num_messages));
        }
        fn half_close(&self) {
            self.events.lock().push(Event::HalfClose);
        }
        fn set_message_compression(&self, enable: bool) {
            self.events.lock().push(Event::Compression(enable));
        }
        fn cancel(&self, reason: GrpcStatus) {
            self.events.lock().push(Event::Cancel(reason.code));
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn attributes(&self) -> Attributes {
            Attributes::empty()
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        closed: Mutex<Vec<GrpcStatus>>,
    }

    impl ClientStreamListener for RecordingListener {
        fn closed(&self, status: GrpcStatus, _progress: RpcProgress, _trailers: GrpcMetadata) {
            self.closed.lock().push(status);
        }
    }

    #[test]
    fn test_operations_buffer_until_resolved() {
        let gate = DeferredStream::new();
        let listener = Arc::new(RecordingListener::default());

        gate.start(listener);
        gate.request(1);
        gate.write_message(Bytes::from_static(b"msg1"));
        gate.write_message(Bytes::from_static(b"msg2"));
        gate.half_close();
        assert_eq!(gate.state(), GateState::Pending);
        assert!(!gate.is_ready());

        let real = Arc::new(RecordingStream::default());
        gate.resolve(real.clone()).unwrap();

        assert_eq!(
            real.events(),
            vec![
                Event::Start,
                Event::Request(1),
                Event::Write(Bytes::from_static(b"msg1")),
                Event::Write(Bytes::from_static(b"msg2")),
                Event::HalfClose,
            ]
        );
        assert_eq!(gate.state(), GateState::Resolved);
    }

    #[test]
    fn test_operations_after_resolution_pass_through() {
        let gate = DeferredStream::new();
        let real = Arc::new(RecordingStream::default());
        gate.resolve(real.clone()).unwrap();

        gate.set_message_compression(true);
        gate.flush();
        gate.cancel(GrpcStatus::cancelled("done"));

        assert_eq!(
            real.events(),
            vec![
                Event::Compression(true),
                Event::Flush,
                Event::Cancel(GrpcStatusCode::Cancelled)
            ]
        );
        assert!(gate.is_ready());
    }

    #[test]
    fn test_failure_closes_listener_and_drops_data() {
        let gate = DeferredStream::new();
        let listener = Arc::new(RecordingListener::default());

        gate.start(listener.clone());
        gate.write_message(Bytes::from_static(b"msg1"));
        gate.half_close();
        gate.fail(GrpcStatus::unauthenticated("expired"), Vec::new()).unwrap();

        assert_eq!(*listener.closed.lock(), vec![GrpcStatus::unauthenticated("expired")]);
        assert_eq!(gate.state(), GateState::Failed(GrpcStatus::unauthenticated("expired")));

        // A listener started after failure observes the same status.
        let late = Arc::new(RecordingListener::default());
        gate.start(late.clone());
        gate.write_message(Bytes::from_static(b"msg3"));
        gate.cancel(GrpcStatus::cancelled("too late"));
        assert_eq!(*late.closed.lock(), vec![GrpcStatus::unauthenticated("expired")]);
        assert_eq!(listener.closed.lock().len(), 1);
    }

    #[test]
    fn test_cancel_while_pending_is_first_replayed() {
        let gate = DeferredStream::new();
        let listener = Arc::new(RecordingListener::default());

        gate.start(listener.clone());
        gate.write_message(Bytes::from_static(b"never sent"));
        gate.cancel(GrpcStatus::cancelled("caller gave up"));

        assert_eq!(*listener.closed.lock(), vec![GrpcStatus::cancelled("caller gave up")]);
        assert_eq!(gate.state(), GateState::Cancelled(GrpcStatus::cancelled("caller gave up")));

        let real = Arc::new(RecordingStream::default());
        gate.resolve(real.clone()).unwrap();
        gate.write_message(Bytes::from_static(b"after"));

        assert_eq!(real.events(), vec![Event::Cancel(GrpcStatusCode::Cancelled)]);
        assert_eq!(listener.closed.lock().len(), 1);
    }

    #[test]
    fn test_cancel_then_failure_is_noop() {
        let gate = DeferredStream::new();
        let listener = Arc::new(RecordingListener::default());

        gate.start(listener.clone());
        gate.cancel(GrpcStatus::cancelled("bye"));
        gate.fail(GrpcStatus::unauthenticated("expired"), Vec::new()).unwrap();

        assert_eq!(*listener.closed.lock(), vec![GrpcStatus::cancelled("bye")]);
        assert!(matches!(gate.state(), GateState::Cancelled(_)));
    }

    #[test]
    fn test_start_after_pending_cancel_closes_immediately() {
        let gate = DeferredStream::new();
        gate.cancel(GrpcStatus::cancelled("early"));

        let listener = Arc::new(RecordingListener::default());
        gate.start(listener.clone());
        assert_eq!(*listener.closed.lock(), vec![GrpcStatus::cancelled("early")]);

        // Cancelling again changes nothing.
        gate.cancel(GrpcStatus::cancelled("again"));
        assert!(matches!(gate.state(), GateState::Cancelled(s) if s.message == "early"));
    }

    #[test]
    fn test_second_resolution_is_rejected() {
        let gate = DeferredStream::new();
        let first = Arc::new(RecordingStream::default());
        let second = Arc::new(RecordingStream::default());

        gate.resolve(first.clone()).unwrap();
        assert_eq!(gate.resolve(second.clone()), Err(GateError::AlreadyResolved));
        assert_eq!(
            gate.fail(GrpcStatus::unauthenticated("late"), Vec::new()),
            Err(GateError::AlreadyResolved)
        );

        gate.flush();
        assert_eq!(first.events(), vec![Event::Flush]);
        assert!(second.events().is_empty());
        assert_eq!(gate.state(), GateState::Resolved);
    }

    #[test]
    fn test_concurrent_resolutions_pick_one() {
        for _ in 0..64 {
            let gate = DeferredStream::new();
            let listener = Arc::new(RecordingListener::default());
            gate.start(listener.clone());

            let barrier = Arc::new(std::sync::Barrier::new(2));
            let real = Arc::new(RecordingStream::default());

            let g = gate.clone();
            let b = barrier.clone();
            let r = real.clone();
            let succeed = std::thread::spawn(move || {
                b.wait();
                g.resolve(r).is_ok()
            });
            let g = gate.clone();
            let b = barrier.clone();
            let failing = std::thread::spawn(move || {
                b.wait();
                g.fail(GrpcStatus::unauthenticated("racing"), Vec::new()).is_ok()
            });

            let won_success = succeed.join().unwrap();
            let won_failure = failing.join().unwrap();
            assert!(won_success ^ won_failure, "exactly one resolution must win");

            if won_success {
                assert_eq!(real.events(), vec![Event::Start]);
                assert!(listener.closed.lock().is_empty());
                assert_eq!(gate.state(), GateState::Resolved);
            } else {
                assert!(real.events().is_empty());
                assert_eq!(listener.closed.lock().len(), 1);
                assert!(matches!(gate.state(), GateState::Failed(_)));
            }
        }
    }

    #[test]
    fn test_concurrent_writes_keep_order_across_resolution() {
        for _ in 0..32 {
            let gate = DeferredStream::new();
            let real = Arc::new(RecordingStream::default());

            let writer_gate = gate.clone();
            let writer = std::thread::spawn(move || {
                for i in 0..200u32 {
                    writer_gate.request(i);
                }
            });
            let resolver_gate = gate.clone();
            let resolver_real = real.clone();
            let resolver = std::thread::spawn(move || {
                resolver_gate.resolve(resolver_real).unwrap();
            });
            writer.join().unwrap();
            resolver.join().unwrap();

            let expected: Vec<Event> = (0..200u32).map(Event::Request).collect();
            assert_eq!(real.events(), expected);
        }
    }
}
