//! Transport contracts consumed and decorated by the credential layer.
//!
//! A [`ClientTransportFactory`] creates [`ConnectionClientTransport`]s; a
//! transport opens [`ClientStream`]s. Connection management, framing and
//! encryption live behind these traits.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::credentials::CallCredentials;
use crate::error::{Result, TransportError};
use crate::grpc::{
    Attributes, CallOptions, ClientStream, ClientStreamTracer, GrpcMetadata, GrpcStatus,
    MethodDescriptor,
};

/// Process-unique identifier used to correlate transport log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogId(u64);

impl LogId {
    /// Allocate a fresh id.
    pub fn allocate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// Options for creating a transport.
#[derive(Debug, Clone)]
pub struct ClientTransportOptions {
    /// The default authority for streams on this transport.
    pub authority: String,
}

impl ClientTransportOptions {
    /// Create options with the given default authority.
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
        }
    }
}

impl Default for ClientTransportOptions {
    fn default() -> Self {
        Self::new("localhost")
    }
}

/// A connected transport that can open streams.
pub trait ConnectionClientTransport: Send + Sync {
    /// Open a new stream. The stream is not started.
    fn new_stream(
        &self,
        method: &MethodDescriptor,
        headers: GrpcMetadata,
        options: &CallOptions,
        tracers: &[Arc<dyn ClientStreamTracer>],
    ) -> Arc<dyn ClientStream>;

    /// Attributes of the connection (negotiated security level, peer address).
    fn attributes(&self) -> Attributes;

    /// Identifier for log correlation.
    fn log_id(&self) -> LogId;

    /// Stop accepting new streams and close once existing streams finish.
    fn shutdown(&self, reason: GrpcStatus);

    /// Close immediately, failing every active stream with `reason`.
    fn shutdown_now(&self, reason: GrpcStatus);
}

/// Creates transports to server addresses.
pub trait ClientTransportFactory: Send + Sync {
    /// Create a transport to `address`. The transport is not yet connected.
    fn new_client_transport(
        &self,
        address: SocketAddr,
        options: &ClientTransportOptions,
    ) -> Arc<dyn ConnectionClientTransport>;

    /// The runtime used for timers and background work of this factory.
    fn scheduler(&self) -> tokio::runtime::Handle;

    /// Create an equivalent factory bound to different channel-level call
    /// credentials.
    fn swap_channel_credentials(
        &self,
        _credentials: Option<Arc<dyn CallCredentials>>,
    ) -> Result<Arc<dyn ClientTransportFactory>> {
        Err(TransportError::Unsupported("swap_channel_credentials"))
    }

    /// Release resources held by the factory. Transports already created are
    /// not affected.
    fn close(&self);
}
