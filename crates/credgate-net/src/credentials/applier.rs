//! The completion sink handed to credentials.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use credgate_core::logging::targets;
use parking_lot::Mutex;

use crate::grpc::{GrpcMetadata, GrpcStatus, GrpcStatusCode};

/// Description used when a credential panics instead of failing the applier.
pub const PANICKED_DESCRIPTION: &str = "Credentials should use fail() instead of panicking";

/// Description used when a credential drops the applier without completing it.
pub const DROPPED_DESCRIPTION: &str = "Credentials dropped the metadata applier without completing it";

/// The result of applying credentials to one call.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// The credential produced metadata to attach to the call.
    Applied(GrpcMetadata),
    /// The credential refused the call.
    Rejected(GrpcStatus),
    /// The credential broke its contract (it panicked); carries the cause.
    Faulted(String),
}

impl ApplyOutcome {
    /// Collapse the outcome into metadata or a terminal status.
    ///
    /// Every failure surfaces as `UNAUTHENTICATED`. A rejection with another
    /// code keeps its description and records the original code in `cause`.
    /// `Faulted` becomes [`PANICKED_DESCRIPTION`] with the fault as its cause,
    /// so operators can still tell a panic from a rejection.
    pub fn into_result(self) -> Result<GrpcMetadata, GrpcStatus> {
        match self {
            Self::Applied(metadata) => Ok(metadata),
            Self::Rejected(status) if status.code == GrpcStatusCode::Unauthenticated => {
                Err(status)
            }
            Self::Rejected(status) => {
                let mut cause =
                    format!("credentials rejected the call with {}", status.code.name());
                if let Some(inner) = &status.cause {
                    cause.push_str(": ");
                    cause.push_str(inner);
                }
                Err(GrpcStatus::unauthenticated(status.message).with_cause(cause))
            }
            Self::Faulted(cause) => {
                Err(GrpcStatus::unauthenticated(PANICKED_DESCRIPTION).with_cause(cause))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Rejected(_) => "rejected",
            Self::Faulted(_) => "faulted",
        }
    }
}

type Sink = Box<dyn FnOnce(ApplyOutcome) + Send + 'static>;

/// One-shot completion shared by an applier and its dispatcher.
struct Completion {
    fired: AtomicBool,
    sink: Mutex<Option<Sink>>,
    /// Thread currently running the guarded credential invocation, if any.
    invoking_thread: Mutex<Option<ThreadId>>,
}

impl Completion {
    /// Deliver `outcome` if nothing was delivered before. Returns whether this
    /// call won.
    fn complete(&self, outcome: ApplyOutcome) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(
                target: targets::CREDENTIALS,
                outcome = outcome.kind(),
                "Ignoring duplicate completion of metadata applier"
            );
            return false;
        }

        let sink = self.sink.lock().take();
        if let Some(sink) = sink {
            sink(outcome);
        }
        true
    }

    fn is_completed(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn is_invoking_on_current_thread(&self) -> bool {
        *self.invoking_thread.lock() == Some(std::thread::current().id())
    }
}

/// Receives the result of a credential's metadata computation.
///
/// A credential must eventually call exactly one of [`apply`](Self::apply) or
/// [`fail`](Self::fail). Both consume the applier, so a second completion
/// cannot be expressed. Dropping the applier without completing it fails the
/// call with `UNAUTHENTICATED`.
pub struct MetadataApplier {
    completion: Arc<Completion>,
    done: bool,
}

impl MetadataApplier {
    /// Create an applier that forwards its outcome to `sink`.
    pub fn new(sink: impl FnOnce(ApplyOutcome) + Send + 'static) -> Self {
        Self {
            completion: Arc::new(Completion {
                fired: AtomicBool::new(false),
                sink: Mutex::new(Some(Box::new(sink))),
                invoking_thread: Mutex::new(None),
            }),
            done: false,
        }
    }

    /// Complete with metadata to attach to the call.
    pub fn apply(self, metadata: GrpcMetadata) {
        self.complete(ApplyOutcome::Applied(metadata));
    }

    /// Complete by rejecting the call with `status`.
    ///
    /// `status` must not be OK; an OK status is treated as `UNAUTHENTICATED`.
    pub fn fail(self, status: GrpcStatus) {
        let status = if status.is_ok() {
            tracing::warn!(
                target: targets::CREDENTIALS,
                "Credentials failed the metadata applier with an OK status"
            );
            GrpcStatus::unauthenticated("Credentials failed with an OK status")
        } else {
            status
        };
        self.complete(ApplyOutcome::Rejected(status));
    }

    /// Complete with an already classified outcome.
    pub(crate) fn complete(mut self, outcome: ApplyOutcome) {
        self.done = true;
        self.completion.complete(outcome);
    }

    /// A handle the dispatcher keeps to fail the call if invocation panics.
    pub(crate) fn guard(&self) -> ApplierGuard {
        ApplierGuard {
            completion: self.completion.clone(),
        }
    }
}

impl Drop for MetadataApplier {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let panicking = std::thread::panicking();
        if panicking && self.completion.is_invoking_on_current_thread() {
            // The dispatcher catching this panic reports it with its payload.
            return;
        }
        let outcome = if panicking {
            ApplyOutcome::Faulted("credentials panicked while holding the metadata applier".into())
        } else {
            tracing::warn!(target: targets::CREDENTIALS, "{}", DROPPED_DESCRIPTION);
            ApplyOutcome::Rejected(GrpcStatus::unauthenticated(DROPPED_DESCRIPTION))
        };
        if !self.completion.is_completed() {
            self.completion.complete(outcome);
        }
    }
}

impl fmt::Debug for MetadataApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataApplier")
            .field("completed", &self.completion.is_completed())
            .finish()
    }
}

/// Dispatcher-side handle onto an applier's completion.
pub(crate) struct ApplierGuard {
    completion: Arc<Completion>,
}

impl ApplierGuard {
    /// Mark the current thread as running the guarded invocation.
    pub(crate) fn arm(&self) {
        *self.completion.invoking_thread.lock() = Some(std::thread::current().id());
    }

    /// Clear the mark set by [`arm`](Self::arm).
    pub(crate) fn disarm(&self) {
        *self.completion.invoking_thread.lock() = None;
    }

    /// Fail the call as faulted unless it already completed.
    pub(crate) fn fault(&self, cause: impl Into<String>) -> bool {
        if self.completion.is_completed() {
            return false;
        }
        self.completion.complete(ApplyOutcome::Faulted(cause.into()))
    }

    #[cfg(test)]
    pub(crate) fn is_completed(&self) -> bool {
        self.completion.is_completed()
    }
}

static_assertions::assert_impl_all!(MetadataApplier: Send);
static_assertions::assert_not_impl_any!(MetadataApplier: Clone);
