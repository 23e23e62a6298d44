//! Credentials that apply two credentials in sequence.

use std::sync::Arc;

use credgate_core::Executor;

use super::dispatch::invoke_guarded;
use super::{ApplyOutcome, CallCredentials, MetadataApplier, RequestInfo};

/// Applies `first`, then `second`, and completes with the metadata of both.
///
/// The combined metadata holds `first`'s entries followed by `second`'s. A key
/// produced by both carries both values in that order; nothing is replaced or
/// deduplicated. If either credential rejects or panics, the composite
/// completes with that outcome and the other result is discarded. Both
/// credentials run behind the same panic boundary, so a panic keeps its
/// payload as the fault cause.
#[derive(Clone)]
pub struct CompositeCallCredentials {
    first: Arc<dyn CallCredentials>,
    second: Arc<dyn CallCredentials>,
}

impl CompositeCallCredentials {
    /// Combine two credentials.
    pub fn new(first: Arc<dyn CallCredentials>, second: Arc<dyn CallCredentials>) -> Self {
        Self { first, second }
    }
}

impl CallCredentials for CompositeCallCredentials {
    fn apply_request_metadata(
        &self,
        info: &RequestInfo,
        executor: Arc<dyn Executor>,
        applier: MetadataApplier,
    ) {
        let second = self.second.clone();
        let second_info = info.clone();
        let second_executor = executor.clone();

        let after_first = MetadataApplier::new(move |outcome| match outcome {
            ApplyOutcome::Applied(first_metadata) => {
                let combine = MetadataApplier::new(move |outcome| match outcome {
                    ApplyOutcome::Applied(second_metadata) => {
                        let mut combined = first_metadata;
                        combined.merge(&second_metadata);
                        applier.apply(combined);
                    }
                    other => applier.complete(other),
                });
                invoke_guarded(second.as_ref(), &second_info, second_executor, combine);
            }
            other => applier.complete(other),
        });

        invoke_guarded(self.first.as_ref(), info, executor, after_first);
    }
}

impl std::fmt::Debug for CompositeCallCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCallCredentials").finish_non_exhaustive()
    }
}
