//! Transport factory and transport decorators that gate streams on call
//! credentials.

use std::fmt;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use credgate_core::Executor;
use credgate_core::logging::targets;

use super::dispatch::{dispatch, panic_message, select_executor};
use super::{
    ApplyOutcome, CallCredentials, DeferredStream, MetadataApplier, RequestInfo,
    resolve_credentials,
};
use crate::error::{Result, TransportError};
use crate::grpc::{
    Attributes, CallOptions, ClientStream, ClientStreamTracer, ClientTransportFactory,
    ClientTransportOptions, ConnectionClientTransport, GrpcMetadata, GrpcStatus, LogId,
    MethodDescriptor,
};

/// Description used when the wrapped transport panics while opening a stream
/// after credentials succeeded.
pub const STREAM_PANICKED_DESCRIPTION: &str = "Transport panicked while opening the stream";

/// Wraps a [`ClientTransportFactory`] so that every transport it creates
/// applies call credentials before opening streams.
///
/// `channel_credentials` apply to every call; a call's own credentials (see
/// [`CallOptions::with_call_credentials`]) are applied after them.
/// Credentials run on the call's executor when it sets one, otherwise on
/// `app_executor`.
pub struct CallCredentialsApplyingTransportFactory {
    delegate: Arc<dyn ClientTransportFactory>,
    channel_credentials: Option<Arc<dyn CallCredentials>>,
    app_executor: Arc<dyn Executor>,
}

impl CallCredentialsApplyingTransportFactory {
    /// Wrap `delegate`.
    pub fn new(
        delegate: Arc<dyn ClientTransportFactory>,
        channel_credentials: Option<Arc<dyn CallCredentials>>,
        app_executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            delegate,
            channel_credentials,
            app_executor,
        }
    }
}

impl ClientTransportFactory for CallCredentialsApplyingTransportFactory {
    fn new_client_transport(
        &self,
        address: SocketAddr,
        options: &ClientTransportOptions,
    ) -> Arc<dyn ConnectionClientTransport> {
        let delegate = self.delegate.new_client_transport(address, options);
        tracing::debug!(
            target: targets::TRANSPORT,
            %address,
            authority = %options.authority,
            log_id = %delegate.log_id(),
            "Created credential-applying transport"
        );
        Arc::new(CallCredentialsApplyingTransport {
            delegate,
            authority: options.authority.clone(),
            channel_credentials: self.channel_credentials.clone(),
            app_executor: self.app_executor.clone(),
        })
    }

    fn scheduler(&self) -> tokio::runtime::Handle {
        self.delegate.scheduler()
    }

    fn swap_channel_credentials(
        &self,
        _credentials: Option<Arc<dyn CallCredentials>>,
    ) -> Result<Arc<dyn ClientTransportFactory>> {
        Err(TransportError::Unsupported("swap_channel_credentials"))
    }

    fn close(&self) {
        tracing::debug!(target: targets::TRANSPORT, "Closing credential-applying transport factory");
        self.delegate.close();
    }
}

impl fmt::Debug for CallCredentialsApplyingTransportFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallCredentialsApplyingTransportFactory")
            .field("has_channel_credentials", &self.channel_credentials.is_some())
            .finish_non_exhaustive()
    }
}

/// A transport whose streams wait for credentials.
struct CallCredentialsApplyingTransport {
    delegate: Arc<dyn ConnectionClientTransport>,
    authority: String,
    channel_credentials: Option<Arc<dyn CallCredentials>>,
    app_executor: Arc<dyn Executor>,
}

impl ConnectionClientTransport for CallCredentialsApplyingTransport {
    fn new_stream(
        &self,
        method: &MethodDescriptor,
        headers: GrpcMetadata,
        options: &CallOptions,
        tracers: &[Arc<dyn ClientStreamTracer>],
    ) -> Arc<dyn ClientStream> {
        let Some(credentials) =
            resolve_credentials(self.channel_credentials.as_ref(), options.credentials())
        else {
            tracing::trace!(
                target: targets::TRANSPORT,
                method = %method,
                "No call credentials; opening stream directly"
            );
            return self.delegate.new_stream(method, headers, options, tracers);
        };

        let gate = DeferredStream::new();
        let info = RequestInfo::build(method, options, &self.authority, self.delegate.attributes());

        let applier = {
            let gate = gate.clone();
            let delegate = self.delegate.clone();
            let method = method.clone();
            let options = options.clone();
            let tracers = tracers.to_vec();
            let log_id = self.delegate.log_id();

            MetadataApplier::new(move |outcome: ApplyOutcome| {
                let resolution = match outcome.into_result() {
                    Ok(extra) => {
                        let mut headers = headers;
                        headers.merge(&extra);
                        let opened = catch_unwind(AssertUnwindSafe(|| {
                            delegate.new_stream(&method, headers, &options, &tracers)
                        }));
                        match opened {
                            Ok(stream) => gate.resolve(stream),
                            Err(payload) => {
                                let cause = panic_message(payload.as_ref());
                                tracing::warn!(
                                    target: targets::TRANSPORT,
                                    %log_id,
                                    method = %method,
                                    cause = %cause,
                                    "Transport panicked while opening stream; failing stream"
                                );
                                let status = GrpcStatus::internal(STREAM_PANICKED_DESCRIPTION)
                                    .with_cause(cause);
                                gate.fail(status, tracers)
                            }
                        }
                    }
                    Err(status) => {
                        tracing::debug!(
                            target: targets::TRANSPORT,
                            %log_id,
                            method = %method,
                            status = %status,
                            "Call credentials failed; failing stream"
                        );
                        gate.fail(status, tracers)
                    }
                };
                if let Err(err) = resolution {
                    tracing::warn!(target: targets::TRANSPORT, %log_id, error = %err, "Stream resolution ignored");
                }
            })
        };

        dispatch(
            credentials,
            info,
            select_executor(options, &self.app_executor),
            applier,
        );
        Arc::new(gate)
    }

    fn attributes(&self) -> Attributes {
        self.delegate.attributes()
    }

    fn log_id(&self) -> LogId {
        self.delegate.log_id()
    }

    fn shutdown(&self, reason: GrpcStatus) {
        self.delegate.shutdown(reason);
    }

    fn shutdown_now(&self, reason: GrpcStatus) {
        self.delegate.shutdown_now(reason);
    }
}

static_assertions::assert_impl_all!(CallCredentialsApplyingTransportFactory: ClientTransportFactory, Send, Sync);
