//! Chooses the credentials that apply to a call.

use std::sync::Arc;

use super::{CallCredentials, CompositeCallCredentials};

/// Combine channel-level and call-level credentials for one call.
///
/// - neither: `None`, the call proceeds without metadata
/// - one of them: that one
/// - both: a [`CompositeCallCredentials`] applying the channel credentials
///   first and the call credentials second
pub fn resolve_credentials(
    channel: Option<&Arc<dyn CallCredentials>>,
    call: Option<&Arc<dyn CallCredentials>>,
) -> Option<Arc<dyn CallCredentials>> {
    match (channel, call) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(channel), Some(call)) => Some(Arc::new(CompositeCallCredentials::new(
            channel.clone(),
            call.clone(),
        ))),
    }
}
