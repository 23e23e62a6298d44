//! Runs credentials on an executor behind a panic boundary.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use credgate_core::logging::{span_names, targets};
use credgate_core::{Executor, PerfSpan};

use super::{CallCredentials, MetadataApplier, RequestInfo};
use crate::grpc::CallOptions;

/// Pick the executor for a call: the call's own executor when it has one,
/// otherwise the factory default.
pub(crate) fn select_executor(
    options: &CallOptions,
    default_executor: &Arc<dyn Executor>,
) -> Arc<dyn Executor> {
    options
        .executor()
        .cloned()
        .unwrap_or_else(|| default_executor.clone())
}

/// Invoke `credentials` on the current thread.
///
/// A panic escaping the credential is caught and reported through `applier`
/// as [`ApplyOutcome::Faulted`](super::ApplyOutcome::Faulted) unless the
/// credential completed the applier before panicking.
pub(crate) fn invoke_guarded(
    credentials: &dyn CallCredentials,
    info: &RequestInfo,
    executor: Arc<dyn Executor>,
    applier: MetadataApplier,
) {
    let guard = applier.guard();
    guard.arm();
    let result = catch_unwind(AssertUnwindSafe(|| {
        credentials.apply_request_metadata(info, executor, applier);
    }));
    guard.disarm();

    if let Err(payload) = result {
        let cause = panic_message(payload.as_ref());
        if guard.fault(cause.clone()) {
            tracing::warn!(
                target: targets::CREDENTIALS,
                method = %info.method(),
                cause = %cause,
                "Credentials panicked instead of failing the metadata applier"
            );
        } else {
            tracing::warn!(
                target: targets::CREDENTIALS,
                method = %info.method(),
                cause = %cause,
                "Ignoring panic after the metadata applier completed"
            );
        }
    }
}

/// Submit a guarded invocation of `credentials` to `executor`.
///
/// The executor is also handed to the credential so it can schedule follow-up
/// work of its own. If the executor drops the task without running it, the
/// applier is dropped with it and the call fails as `UNAUTHENTICATED`.
pub(crate) fn dispatch(
    credentials: Arc<dyn CallCredentials>,
    info: RequestInfo,
    executor: Arc<dyn Executor>,
    applier: MetadataApplier,
) {
    let credential_executor = executor.clone();
    executor.execute(Box::new(move || {
        let _span = PerfSpan::new(span_names::DISPATCH);
        tracing::debug!(
            target: targets::CREDENTIALS,
            method = %info.method(),
            service = info.method().service_name().unwrap_or_default(),
            authority = info.authority(),
            "Applying call credentials"
        );
        invoke_guarded(credentials.as_ref(), &info, credential_executor, applier);
    }));
}

/// Render a panic payload for logs and status causes.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
