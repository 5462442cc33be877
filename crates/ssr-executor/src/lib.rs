//! Out-of-order resolution of async slots.
//!
//! This crate drives a rendered shell to completion:
//! - `AsyncSlot` - One pending computation and its outcome
//! - `ResolutionStream` - Shell, concurrent slots, patches in settlement order
//! - `RenderSession` - Mode dispatch and cancellation
//! - `failure_markup` - What a failed slot turns into

mod fallback;
mod session;
mod slot;
mod stream;

pub use fallback::*;
pub use session::*;
pub use slot::*;
pub use stream::*;
