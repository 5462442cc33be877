//! Observability for render sessions.
//!
//! This crate provides:
//! - `StructuredLogger` - Structured logging with request context
//! - `MetricsCollector` - Time-to-shell and per-slot timings
//! - `MetricsObserver` - Feeds a collector from sink lifecycle events

mod logging;
mod metrics;

pub use logging::*;
pub use metrics::*;

// Re-export RequestId and TimingContext from ssr-core for convenience
pub use ssr_core::{RequestId, TimingContext};
