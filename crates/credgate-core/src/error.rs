//! Error types for credgate core systems.

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while constructing or looking up executors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The rayon pool backing a [`ThreadPoolExecutor`](crate::ThreadPoolExecutor)
    /// could not be built.
    #[error("Failed to create thread pool: {0}")]
    ThreadPoolCreation(String),

    /// No Tokio runtime is entered on the current thread.
    #[error("No Tokio runtime is available on the current thread")]
    NoRuntime,
}

impl CoreError {
    /// Create a thread pool creation error.
    pub fn thread_pool(message: impl Into<String>) -> Self {
        Self::ThreadPoolCreation(message.into())
    }
}
