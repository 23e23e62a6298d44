//! Call-credential gating for gRPC client transports.
//!
//! This crate sits between an RPC channel and its transport and makes every
//! stream wait for its call credentials:
//!
//! - **gRPC contracts**: metadata, status, attributes, streams and transports
//!   ([`grpc`])
//! - **Credentials**: the [`CallCredentials`] trait, composition and the
//!   applier handed to credentials ([`credentials`])
//! - **Deferred streams**: a stream handle usable before its real stream
//!   exists ([`DeferredStream`])
//! - **Decorators**: [`CallCredentialsApplyingTransportFactory`] wraps any
//!   [`ClientTransportFactory`]
//!
//! # Gating a transport
//!
//! ```ignore
//! use std::sync::Arc;
//! use credgate_core::InlineExecutor;
//! use credgate_net::{CallCredentialsApplyingTransportFactory, StaticCallCredentials};
//!
//! let factory = CallCredentialsApplyingTransportFactory::new(
//!     tonic_factory,
//!     Some(Arc::new(StaticCallCredentials::bearer("secret")?)),
//!     Arc::new(InlineExecutor),
//! );
//!
//! let transport = factory.new_client_transport(addr, &options);
//! let stream = transport.new_stream(&method, headers, &call_options, &[]);
//!
//! // Usable immediately; operations are replayed once credentials resolve.
//! stream.start(listener);
//! stream.write_message(request);
//! stream.half_close();
//! ```
//!
//! # Failures
//!
//! A credential that rejects the call, panics, or drops its applier fails
//! the stream: the listener is closed with `UNAUTHENTICATED` (or the status
//! the credential chose) and nothing reaches the transport.

pub mod credentials;
mod error;
pub mod grpc;

pub use error::{GateError, Result, TransportError};

// Re-export commonly used types at the crate root
pub use credentials::{
    ApplyOutcome, CallCredentials, CallCredentialsApplyingTransportFactory,
    CompositeCallCredentials, DeferredStream, GateState, MetadataApplier, RequestInfo,
    StaticCallCredentials, resolve_credentials,
};
pub use grpc::{
    CallOptions, ClientStream, ClientStreamListener, ClientTransportFactory,
    ConnectionClientTransport, GrpcMetadata, GrpcStatus, GrpcStatusCode, MethodDescriptor,
    SecurityLevel,
};
