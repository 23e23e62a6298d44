//! Per-call options.

use std::fmt;
use std::sync::Arc;

use credgate_core::Executor;

use crate::credentials::CallCredentials;

/// Options attached to a single call.
///
/// `CallOptions` is immutable: every `with_*` method returns a modified copy.
///
/// # Example
///
/// ```ignore
/// let options = CallOptions::default()
///     .with_authority("firestore.googleapis.com")
///     .with_call_credentials(Arc::new(token_credentials))
///     .with_executor(Arc::new(InlineExecutor));
/// ```
#[derive(Clone, Default)]
pub struct CallOptions {
    authority: Option<String>,
    credentials: Option<Arc<dyn CallCredentials>>,
    executor: Option<Arc<dyn Executor>>,
}

impl CallOptions {
    /// Override the authority for this call.
    pub fn with_authority(&self, authority: impl Into<String>) -> Self {
        Self {
            authority: Some(authority.into()),
            ..self.clone()
        }
    }

    /// Attach call-level credentials.
    pub fn with_call_credentials(&self, credentials: Arc<dyn CallCredentials>) -> Self {
        Self {
            credentials: Some(credentials),
            ..self.clone()
        }
    }

    /// Run credential work for this call on `executor`.
    pub fn with_executor(&self, executor: Arc<dyn Executor>) -> Self {
        Self {
            executor: Some(executor),
            ..self.clone()
        }
    }

    /// The authority override, if any.
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// The call-level credentials, if any.
    pub fn credentials(&self) -> Option<&Arc<dyn CallCredentials>> {
        self.credentials.as_ref()
    }

    /// The call-level executor, if any.
    pub fn executor(&self) -> Option<&Arc<dyn Executor>> {
        self.executor.as_ref()
    }
}

impl fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOptions")
            .field("authority", &self.authority)
            .field("has_credentials", &self.credentials.is_some())
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}
