//! Executors for running credential work off the calling thread.
//!
//! An [`Executor`] accepts fire-and-forget tasks. Three backends are provided:
//!
//! - [`InlineExecutor`]: runs the task immediately on the submitting thread.
//! - [`ThreadPoolExecutor`]: a rayon work-stealing pool.
//! - [`TokioExecutor`] (feature `tokio`): spawns onto a Tokio runtime handle.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use credgate_core::executor::{Executor, ThreadPoolConfig, ThreadPoolExecutor};
//!
//! let pool: Arc<dyn Executor> =
//!     Arc::new(ThreadPoolExecutor::new(ThreadPoolConfig::with_threads(2)).unwrap());
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! pool.execute(Box::new(move || {
//!     tx.send(42).unwrap();
//! }));
//! assert_eq!(rx.recv().unwrap(), 42);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::error::{CoreError, Result};
use crate::logging::targets;

/// A unit of work submitted to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run tasks, possibly on another thread.
///
/// Implementations must eventually run every submitted task exactly once.
pub trait Executor: Send + Sync {
    /// Submit a task for execution.
    fn execute(&self, task: Task);
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: Task) {
        (**self).execute(task)
    }
}

/// Runs every task synchronously on the submitting thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

/// Configuration for creating a [`ThreadPoolExecutor`].
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of worker threads. `None` means use the number of CPU cores.
    pub num_threads: Option<usize>,
    /// Name prefix for worker threads.
    pub thread_name: String,
    /// Stack size for worker threads in bytes.
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: "credgate-worker".to_string(),
            stack_size: None,
        }
    }
}

impl ThreadPoolConfig {
    /// Create a new configuration with custom thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }

    /// Set the thread name prefix.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// An executor backed by a dedicated rayon thread pool.
pub struct ThreadPoolExecutor {
    pool: RayonThreadPool,
    active_tasks: Arc<AtomicUsize>,
}

impl ThreadPoolExecutor {
    /// Create a new thread pool executor with the given configuration.
    pub fn new(config: ThreadPoolConfig) -> Result<Self> {
        let thread_name = config.thread_name;
        let mut builder = ThreadPoolBuilder::new()
            .thread_name(move |index| format!("{}-{}", thread_name, index))
            .panic_handler(|_| {
                tracing::error!(target: targets::EXECUTOR, "Task panicked on thread pool executor");
            });

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }

        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pool = builder
            .build()
            .map_err(|e| CoreError::thread_pool(e.to_string()))?;

        Ok(Self {
            pool,
            active_tasks: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get the number of threads in the pool.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Get the number of submitted tasks that have not finished yet.
    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::Acquire)
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, task: Task) {
        self.active_tasks.fetch_add(1, Ordering::AcqRel);
        let active_tasks = self.active_tasks.clone();

        self.pool.spawn(move || {
            struct Finished(Arc<AtomicUsize>);
            impl Drop for Finished {
                fn drop(&mut self) {
                    self.0.fetch_sub(1, Ordering::AcqRel);
                }
            }

            let _finished = Finished(active_tasks);
            task();
        });
    }
}

impl std::fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("num_threads", &self.num_threads())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

/// An executor that spawns tasks onto a Tokio runtime.
///
/// Tasks are plain closures; they run on a runtime worker thread, so they
/// should not block for long. Use [`TokioExecutor::blocking`] for credentials
/// that perform blocking I/O.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
    blocking: bool,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    /// Create an executor that spawns onto the given runtime.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            blocking: false,
        }
    }

    /// Create an executor bound to the runtime entered on this thread.
    pub fn current() -> Result<Self> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|_| CoreError::NoRuntime)
    }

    /// Create an executor that uses the runtime's blocking thread pool.
    pub fn blocking(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle,
            blocking: true,
        }
    }

    /// Get the runtime handle this executor spawns onto.
    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }
}

#[cfg(feature = "tokio")]
impl Executor for TokioExecutor {
    fn execute(&self, task: Task) {
        if self.blocking {
            self.handle.spawn_blocking(task);
        } else {
            self.handle.spawn(async move { task() });
        }
    }
}

static_assertions::assert_impl_all!(InlineExecutor: Executor, Send, Sync);
static_assertions::assert_impl_all!(ThreadPoolExecutor: Executor, Send, Sync);
