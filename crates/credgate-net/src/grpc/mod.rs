//! gRPC client-side contracts.
//!
//! This module defines the value types and traits the credential layer is
//! written against:
//! - Metadata (similar to HTTP headers) and status codes
//! - Typed transport attributes and security levels
//! - Method descriptors and per-call options
//! - Stream, listener and tracer traits
//! - Transport and transport factory traits
//!
//! Metadata and status convert to and from their `tonic` equivalents so that
//! the layer can sit in front of a tonic-based transport.

mod attributes;
mod call_options;
mod metadata;
mod method;
mod status;
mod stream;
mod transport;

pub use attributes::{
    ATTR_REMOTE_ADDR, ATTR_SECURITY_LEVEL, AttributeKey, Attributes, AttributesBuilder,
    SecurityLevel,
};
pub use call_options::CallOptions;
pub use metadata::GrpcMetadata;
pub use method::MethodDescriptor;
pub use status::{GrpcStatus, GrpcStatusCode};
pub use stream::{
    ClientStream, ClientStreamListener, ClientStreamTracer, FailingClientStream, RpcProgress,
};
pub use transport::{
    ClientTransportFactory, ClientTransportOptions, ConnectionClientTransport, LogId,
};

// Re-export tonic types for advanced usage
pub use tonic;
