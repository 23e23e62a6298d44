//! Call credentials and the transport decorators that apply them.
//!
//! Every stream opened through a [`CallCredentialsApplyingTransportFactory`]
//! is gated on the call's credentials:
//!
//! 1. The channel-level and call-level credentials are combined
//!    ([`resolve_credentials`]). With neither, the stream is opened directly.
//! 2. A [`RequestInfo`] describing the call is built.
//! 3. The credential runs on the call's executor (or the factory default) and
//!    completes a [`MetadataApplier`].
//! 4. Until then the caller holds a [`DeferredStream`] that buffers its
//!    operations. Success opens the real stream with the extra metadata;
//!    failure closes the caller's listener with the failure status.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use credgate_core::{ThreadPoolConfig, ThreadPoolExecutor};
//! use credgate_net::credentials::{CallCredentialsApplyingTransportFactory, StaticCallCredentials};
//!
//! let executor = Arc::new(ThreadPoolExecutor::new(ThreadPoolConfig::with_threads(2))?);
//! let factory = CallCredentialsApplyingTransportFactory::new(
//!     inner_factory,
//!     Some(Arc::new(StaticCallCredentials::bearer("secret")?)),
//!     executor,
//! );
//! ```

use std::sync::Arc;

use credgate_core::Executor;

mod applier;
mod composite;
mod deferred;
pub(crate) mod dispatch;
mod factory;
mod request_info;
mod resolver;
mod static_creds;

pub use applier::{ApplyOutcome, DROPPED_DESCRIPTION, MetadataApplier, PANICKED_DESCRIPTION};
pub use composite::CompositeCallCredentials;
pub use deferred::{DeferredStream, GateState};
pub use factory::{CallCredentialsApplyingTransportFactory, STREAM_PANICKED_DESCRIPTION};
pub use request_info::RequestInfo;
pub use resolver::resolve_credentials;
pub use static_creds::StaticCallCredentials;

/// Produces per-call authentication metadata.
///
/// Implementations complete `applier` exactly once, either synchronously or
/// later from any thread. Refusing a call is done with
/// [`MetadataApplier::fail`]; panicking is a contract violation that the
/// dispatcher converts into an `UNAUTHENTICATED` failure.
///
/// `executor` is the executor this invocation runs on. Credentials that need
/// to do blocking work (such as refreshing a token) may schedule it there.
pub trait CallCredentials: Send + Sync {
    /// Compute metadata for the call described by `info`.
    fn apply_request_metadata(
        &self,
        info: &RequestInfo,
        executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    );
}

impl<C: CallCredentials + ?Sized> CallCredentials for Arc<C> {
    fn apply_request_metadata(
        &self,
        info: &RequestInfo,
        executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    ) {
        (**self).apply_request_metadata(info, executor, applier);
    }
}
