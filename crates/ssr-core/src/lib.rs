//! Core vocabulary for out-of-order streaming server rendering.
//!
//! This crate provides the fundamental types shared by every layer:
//! - `SlotId` - Placeholder identity inside one render
//! - `RenderConfig` / `RenderMode` - Per-session configuration
//! - `RequestContext` - Typed request parameters
//! - `LifecyclePhase` / `TimingContext` - Request lifecycle tracking
//! - `RenderError` - Error taxonomy

mod config;
mod context;
mod error;
mod lifecycle;
mod slot_id;

pub use config::*;
pub use context::*;
pub use error::*;
pub use lifecycle::*;
pub use slot_id::*;
