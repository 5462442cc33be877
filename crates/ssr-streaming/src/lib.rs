//! Shell rendering and streaming primitives for out-of-order SSR.
//!
//! This crate turns a component tree into a flushable shell and owns
//! the output side of a session:
//! - `ComponentNode` - Static and async parts of the page
//! - `ShellRenderer` - Pre-order traversal producing shell + slots
//! - `StreamingSink` - Sink lifecycle state machine
//! - `patch` - Placeholder, patch and terminator wire format

mod document;
mod node;
pub mod patch;
mod shell;
mod sink;

pub use document::*;
pub use node::*;
pub use shell::*;
pub use sink::*;
