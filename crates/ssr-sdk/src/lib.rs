//! Public SDK for out-of-order streaming server rendering.
//!
//! This crate re-exports the rendering engine:
//!
//! ```ignore
//! use ssr_sdk::prelude::*;
//!
//! async fn handle(sink: StreamingSink<Tx, SendError>) -> Result<SessionReport, RenderError> {
//!     let tree = Document::new(HeadContent::new("Hello"))
//!         .child(ComponentNode::suspense("<p>Loading…</p>", async {
//!             Ok("<p>Done</p>".to_string())
//!         }))
//!         .into_node();
//!
//!     RenderSession::new(RenderConfig::default())
//!         .stream(tree, sink)
//!         .await
//! }
//! ```

pub use ssr_core;
pub use ssr_executor;
pub use ssr_observability;
pub use ssr_streaming;

/// Prelude for convenient imports.
pub mod prelude {
    pub use ssr_core::*;
    pub use ssr_executor::*;
    pub use ssr_observability::{
        LogFormat, LogLevel, MetricsCollector, MetricsObserver, RequestMetrics, StructuredLogger,
    };
    pub use ssr_streaming::*;
}
