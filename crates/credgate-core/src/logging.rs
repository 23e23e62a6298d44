//! Logging facilities for credgate.
//!
//! credgate uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("credgate::gate=trace,credgate::credentials=debug")
//!         .init();
//! }
//! ```
//!
//! Every event is emitted with one of the [`targets`] below so subsystems can
//! be filtered independently.

/// Span names used throughout credgate for tracing.
pub mod span_names {
    /// Credential dispatch span (one per gated call).
    pub const DISPATCH: &str = "credgate::dispatch";
    /// Deferred stream replay span.
    pub const REPLAY: &str = "credgate::replay";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Credential resolution and metadata application.
    pub const CREDENTIALS: &str = "credgate::credentials";
    /// Deferred stream buffering, resolution and replay.
    pub const GATE: &str = "credgate::gate";
    /// Transport and transport factory decorators.
    pub const TRANSPORT: &str = "credgate::transport";
    /// Executor backends.
    pub const EXECUTOR: &str = "credgate::executor";
    /// Timing spans opened by [`PerfSpan`](super::PerfSpan).
    pub const PERF: &str = "credgate::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// Useful for tracking the duration of an operation.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::debug_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
