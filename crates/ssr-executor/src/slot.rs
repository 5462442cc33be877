//! One pending async computation and its outcome.

use std::fmt;

use futures::future::{BoxFuture, FutureExt};
use ssr_core::{RenderError, SlotId};
use ssr_streaming::{Computation, RenderedSlot};

/// Status of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Registered, computation not handed out yet.
    Pending,
    /// Computation handed out and being polled.
    Running,
    /// Computation produced markup.
    Resolved,
    /// Computation returned an error.
    Failed,
}

impl SlotState {
    /// Whether the slot has settled.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }
}

/// Completion notification for one slot.
pub struct Settlement {
    /// Slot that settled.
    pub id: SlotId,
    /// Markup or the computation's error.
    pub outcome: anyhow::Result<String>,
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settlement")
            .field("id", &self.id)
            .field("ok", &self.outcome.is_ok())
            .finish()
    }
}

/// A started computation. Resolves exactly once, to its settlement.
pub type SlotTask = BoxFuture<'static, Settlement>;

/// A slot owned by one render session.
///
/// Moves `Pending -> Running -> Resolved | Failed`, each step once.
pub struct AsyncSlot {
    id: SlotId,
    key: Option<String>,
    fallback: String,
    state: SlotState,
    computation: Option<Computation>,
    result: Option<anyhow::Result<String>>,
}

impl AsyncSlot {
    /// Create a pending slot.
    pub fn new(id: SlotId, fallback: impl Into<String>, computation: Computation) -> Self {
        Self {
            id,
            key: None,
            fallback: fallback.into(),
            state: SlotState::Pending,
            computation: Some(computation),
            result: None,
        }
    }

    /// Hand out the computation as a task tagged with this slot's id.
    ///
    /// The task does nothing until polled; the caller decides where and
    /// alongside what it runs.
    pub fn start(&mut self) -> Result<SlotTask, RenderError> {
        let computation = match (self.state, self.computation.take()) {
            (SlotState::Pending, Some(computation)) => computation,
            _ => return Err(RenderError::SlotAlreadyStarted(self.id)),
        };
        self.state = SlotState::Running;

        let id = self.id;
        Ok(computation
            .map(move |outcome| Settlement { id, outcome })
            .boxed())
    }

    /// Record the outcome. Allowed once.
    pub fn settle(&mut self, outcome: anyhow::Result<String>) -> Result<(), RenderError> {
        if self.state.is_settled() {
            return Err(RenderError::SlotAlreadySettled(self.id));
        }
        self.state = if outcome.is_ok() {
            SlotState::Resolved
        } else {
            SlotState::Failed
        };
        self.computation = None;
        self.result = Some(outcome);
        Ok(())
    }

    /// Slot id.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Key of the originating async node.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Fallback markup.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Current state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Resolved markup, if the computation succeeded.
    pub fn markup(&self) -> Option<&str> {
        match &self.result {
            Some(Ok(markup)) => Some(markup),
            _ => None,
        }
    }

    /// The computation's error, if it failed.
    pub fn error(&self) -> Option<&anyhow::Error> {
        match &self.result {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<RenderedSlot> for AsyncSlot {
    fn from(slot: RenderedSlot) -> Self {
        let mut async_slot = Self::new(slot.id, slot.fallback, slot.computation);
        async_slot.key = slot.key;
        async_slot
    }
}

impl fmt::Debug for AsyncSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSlot")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(outcome: anyhow::Result<String>) -> AsyncSlot {
        AsyncSlot::new(SlotId(2), "<p>wait</p>", async move { outcome }.boxed())
    }

    #[tokio::test]
    async fn test_start_runs_once_and_tags_settlement() {
        let mut s = slot(Ok("<p>done</p>".to_string()));
        assert_eq!(s.state(), SlotState::Pending);

        let task = s.start().unwrap();
        assert_eq!(s.state(), SlotState::Running);
        assert!(matches!(s.start(), Err(RenderError::SlotAlreadyStarted(SlotId(2)))));

        let settlement = task.await;
        assert_eq!(settlement.id, SlotId(2));
        s.settle(settlement.outcome).unwrap();
        assert_eq!(s.state(), SlotState::Resolved);
        assert_eq!(s.markup(), Some("<p>done</p>"));
    }

    #[tokio::test]
    async fn test_failed_computation_settles_failed() {
        let mut s = slot(Err(anyhow::anyhow!("backend down")));
        let settlement = s.start().unwrap().await;
        s.settle(settlement.outcome).unwrap();

        assert_eq!(s.state(), SlotState::Failed);
        assert!(s.markup().is_none());
        assert_eq!(s.error().unwrap().to_string(), "backend down");
    }

    #[test]
    fn test_settle_is_terminal() {
        let mut s = slot(Ok(String::new()));
        s.settle(Ok("a".to_string())).unwrap();
        assert!(matches!(
            s.settle(Ok("b".to_string())),
            Err(RenderError::SlotAlreadySettled(SlotId(2)))
        ));
        assert_eq!(s.markup(), Some("a"));
        assert!(matches!(s.start(), Err(RenderError::SlotAlreadyStarted(_))));
    }
}
