//! In-memory transports, streams and credentials shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use credgate_core::Executor;
use credgate_net::credentials::{CallCredentials, MetadataApplier, RequestInfo};
use credgate_net::grpc::{
    ATTR_SECURITY_LEVEL, Attributes, CallOptions, ClientStream, ClientStreamListener,
    ClientStreamTracer, ClientTransportFactory, ClientTransportOptions, ConnectionClientTransport,
    GrpcMetadata, GrpcStatus, GrpcStatusCode, LogId, MethodDescriptor, RpcProgress, SecurityLevel,
};
use parking_lot::Mutex;

/// An operation observed by a [`RecordingStream`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Start,
    Write(Bytes),
    Flush,
    Request(u32),
    HalfClose,
    Compression(bool),
    Cancel(GrpcStatusCode),
}

#[derive(Default)]
pub struct RecordingStream {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingStream {
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }
}

impl ClientStream for RecordingStream {
    fn start(&self, _listener: Arc<dyn ClientStreamListener>) {
        self.events.lock().push(StreamEvent::Start);
    }
    fn write_message(&self, message: Bytes) {
        self.events.lock().push(StreamEvent::Write(message));
    }
    fn flush(&self) {
        self.events.lock().push(StreamEvent::Flush);
    }
    fn request(&self, num_messages: u32) {
        self.events.lock().push(StreamEvent::Request(num_messages));
    }
    fn half_close(&self) {
        self.events.lock().push(StreamEvent::HalfClose);
    }
    fn set_message_compression(&self, enable: bool) {
        self.events.lock().push(StreamEvent::Compression(enable));
    }
    fn cancel(&self, reason: GrpcStatus) {
        self.events.lock().push(StreamEvent::Cancel(reason.code));
    }
    fn is_ready(&self) -> bool {
        true
    }
    fn attributes(&self) -> Attributes {
        Attributes::empty()
    }
}

#[derive(Default)]
pub struct RecordingListener {
    closed: Mutex<Vec<GrpcStatus>>,
}

impl RecordingListener {
    pub fn closed(&self) -> Vec<GrpcStatus> {
        self.closed.lock().clone()
    }
}

impl ClientStreamListener for RecordingListener {
    fn closed(&self, status: GrpcStatus, _progress: RpcProgress, _trailers: GrpcMetadata) {
        self.closed.lock().push(status);
    }
}

#[derive(Default)]
pub struct RecordingTracer {
    pub closed: Mutex<Vec<GrpcStatusCode>>,
}

impl ClientStreamTracer for RecordingTracer {
    fn stream_closed(&self, status: &GrpcStatus) {
        self.closed.lock().push(status.code);
    }
}

/// A stream the fake transport opened, with the headers it was opened with.
pub struct OpenedStream {
    pub method: String,
    pub headers: GrpcMetadata,
    pub stream: Arc<RecordingStream>,
}

pub struct FakeTransport {
    attributes: Attributes,
    log_id: LogId,
    pub opened: Mutex<Vec<OpenedStream>>,
    pub shutdowns: Mutex<Vec<(&'static str, GrpcStatus)>>,
    /// When set, `new_stream` panics.
    pub fail_streams: AtomicBool,
}

impl FakeTransport {
    pub fn new(security: Option<SecurityLevel>) -> Self {
        let attributes = match security {
            Some(level) => Attributes::builder().set(&ATTR_SECURITY_LEVEL, level).build(),
            None => Attributes::empty(),
        };
        Self {
            attributes,
            log_id: LogId::allocate(),
            opened: Mutex::new(Vec::new()),
            shutdowns: Mutex::new(Vec::new()),
            fail_streams: AtomicBool::new(false),
        }
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// The single stream opened so far.
    pub fn only_stream(&self) -> Arc<RecordingStream> {
        let opened = self.opened.lock();
        assert_eq!(opened.len(), 1, "expected exactly one opened stream");
        opened[0].stream.clone()
    }

    pub fn only_headers(&self) -> GrpcMetadata {
        let opened = self.opened.lock();
        assert_eq!(opened.len(), 1, "expected exactly one opened stream");
        opened[0].headers.clone()
    }
}

impl ConnectionClientTransport for FakeTransport {
    fn new_stream(
        &self,
        method: &MethodDescriptor,
        headers: GrpcMetadata,
        _options: &CallOptions,
        _tracers: &[Arc<dyn ClientStreamTracer>],
    ) -> Arc<dyn ClientStream> {
        if self.fail_streams.load(Ordering::SeqCst) {
            panic!("transport exploded");
        }
        let stream = Arc::new(RecordingStream::default());
        self.opened.lock().push(OpenedStream {
            method: method.full_method_name().to_string(),
            headers,
            stream: stream.clone(),
        });
        stream
    }

    fn attributes(&self) -> Attributes {
        self.attributes.clone()
    }

    fn log_id(&self) -> LogId {
        self.log_id
    }

    fn shutdown(&self, reason: GrpcStatus) {
        self.shutdowns.lock().push(("shutdown", reason));
    }

    fn shutdown_now(&self, reason: GrpcStatus) {
        self.shutdowns.lock().push(("shutdown_now", reason));
    }
}

pub struct FakeFactory {
    security: Option<SecurityLevel>,
    scheduler: Option<tokio::runtime::Handle>,
    pub transports: Mutex<Vec<Arc<FakeTransport>>>,
    pub closed: AtomicBool,
}

impl FakeFactory {
    pub fn new(security: Option<SecurityLevel>) -> Self {
        Self {
            security,
            scheduler: None,
            transports: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_scheduler(mut self, handle: tokio::runtime::Handle) -> Self {
        self.scheduler = Some(handle);
        self
    }

    pub fn last_transport(&self) -> Arc<FakeTransport> {
        self.transports
            .lock()
            .last()
            .cloned()
            .expect("no transport created")
    }
}

impl ClientTransportFactory for FakeFactory {
    fn new_client_transport(
        &self,
        _address: SocketAddr,
        _options: &ClientTransportOptions,
    ) -> Arc<dyn ConnectionClientTransport> {
        let transport = Arc::new(FakeTransport::new(self.security));
        self.transports.lock().push(transport.clone());
        transport
    }

    fn scheduler(&self) -> tokio::runtime::Handle {
        self.scheduler.clone().expect("fake factory has no scheduler")
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn address() -> SocketAddr {
    "127.0.0.1:50051".parse().unwrap()
}

pub fn method() -> MethodDescriptor {
    MethodDescriptor::new("pkg.Service/Call")
}

/// Attaches fixed metadata and counts invocations.
pub struct FixedCredentials {
    metadata: GrpcMetadata,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<RequestInfo>>,
}

impl FixedCredentials {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            metadata: GrpcMetadata::from_pairs(pairs.iter().copied()).unwrap(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_info(&self) -> RequestInfo {
        self.seen.lock().last().cloned().expect("credentials never invoked")
    }
}

impl CallCredentials for FixedCredentials {
    fn apply_request_metadata(
        &self,
        info: &RequestInfo,
        _executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(info.clone());
        applier.apply(self.metadata.clone());
    }
}

/// Holds appliers until the test completes them.
#[derive(Default)]
pub struct ManualCredentials {
    appliers: Mutex<Vec<MetadataApplier>>,
}

impl ManualCredentials {
    pub fn take(&self) -> MetadataApplier {
        self.appliers.lock().pop().expect("credentials never invoked")
    }
}

impl CallCredentials for ManualCredentials {
    fn apply_request_metadata(
        &self,
        _info: &RequestInfo,
        _executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    ) {
        self.appliers.lock().push(applier);
    }
}

pub struct RejectingCredentials(pub GrpcStatus);

impl CallCredentials for RejectingCredentials {
    fn apply_request_metadata(
        &self,
        _info: &RequestInfo,
        _executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    ) {
        applier.fail(self.0.clone());
    }
}

pub struct PanickingCredentials;

impl CallCredentials for PanickingCredentials {
    fn apply_request_metadata(
        &self,
        _info: &RequestInfo,
        _executor: Arc<dyn Executor>,
        _applier: MetadataApplier,
    ) {
        panic!("token refresh blew up");
    }
}

/// Runs every task inline and counts submissions.
#[derive(Default)]
pub struct CountingExecutor {
    pub submitted: AtomicUsize,
}

impl Executor for CountingExecutor {
    fn execute(&self, task: credgate_core::Task) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        task();
    }
}
