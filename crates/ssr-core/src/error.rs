//! Error taxonomy for render sessions.

use crate::SlotId;

/// Error type for render operations.
///
/// A failing async computation is not represented here: it settles its
/// slot as failed and the session carries on.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Malformed tree: {0}")]
    MalformedTree(String),

    #[error("Sink write failed: {0}")]
    SinkWrite(String),

    #[error("Shell not sent before patches")]
    ShellNotSent,

    #[error("Shell already sent")]
    ShellAlreadySent,

    #[error("Sink already closed")]
    SinkClosed,

    #[error("Render session aborted")]
    Aborted,

    #[error("Slot {0} already started")]
    SlotAlreadyStarted(SlotId),

    #[error("Slot {0} already settled")]
    SlotAlreadySettled(SlotId),

    #[error("{0} slot(s) still outstanding")]
    Incomplete(usize),

    #[error("Unknown slot {0}")]
    UnknownSlot(SlotId),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RenderError {
    /// Whether this error ends the session without further writes.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SinkWrite(_) | Self::SinkClosed | Self::Aborted | Self::MalformedTree(_)
        )
    }
}
