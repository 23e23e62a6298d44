//! Core systems for credgate.
//!
//! This crate provides the runtime-agnostic building blocks shared by the
//! credgate networking layer:
//!
//! - **Executors**: where credential work runs ([`Executor`], [`InlineExecutor`],
//!   [`ThreadPoolExecutor`], and [`TokioExecutor`] with the `tokio` feature)
//! - **Logging**: `tracing` targets and span helpers
//! - **Errors**: [`CoreError`] for executor construction failures

mod error;
pub mod executor;
pub mod logging;

pub use error::{CoreError, Result};
pub use executor::{Executor, InlineExecutor, Task, ThreadPoolConfig, ThreadPoolExecutor};
#[cfg(feature = "tokio")]
pub use executor::TokioExecutor;
pub use logging::PerfSpan;
