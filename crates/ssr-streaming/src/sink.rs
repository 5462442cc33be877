//! Output sink with an explicit lifecycle.

use std::fmt::Display;
use std::sync::Arc;

use futures::{Sink, SinkExt};
use ssr_core::{LifecycleObserver, LifecyclePhase, RenderError, SlotId, TimingContext};

/// State of the streaming sink.
///
/// `Idle -> ShellSent -> Patching* -> Closed`, with `Aborted` reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing written yet.
    Idle,
    /// Shell has been sent.
    ShellSent,
    /// At least one patch has been sent.
    Patching,
    /// Response completed; the inner sink is closed.
    Closed,
    /// Peer went away or the session was cancelled.
    Aborted,
}

impl StreamState {
    /// Whether the sink refuses every further write.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Aborted)
    }
}

/// Sink that enforces shell-first writes and refuses writes once finished.
///
/// Generic over any `Sink<Vec<u8>>`, so the same lifecycle drives an HTTP
/// body channel in production and an in-memory channel in tests.
pub struct StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    state: StreamState,
    timing: TimingContext,
    patches_sent: Vec<SlotId>,
    last_patch_bytes: usize,
    observers: Vec<Arc<dyn LifecycleObserver>>,
}

impl<S, E> StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a new streaming sink.
    pub fn new(sink: S, timing: TimingContext) -> Self {
        Self {
            inner: sink,
            state: StreamState::Idle,
            timing,
            patches_sent: Vec::new(),
            last_patch_bytes: 0,
            observers: Vec::new(),
        }
    }

    /// Register an observer for lifecycle phases.
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Send the shell. Must be the first write.
    pub async fn send_shell(&mut self, html: &str) -> Result<(), RenderError> {
        match self.state {
            StreamState::Idle => {}
            StreamState::Closed | StreamState::Aborted => return Err(RenderError::SinkClosed),
            StreamState::ShellSent | StreamState::Patching => {
                return Err(RenderError::ShellAlreadySent)
            }
        }

        self.timing.mark("shell_start");
        self.write(html.as_bytes().to_vec()).await?;
        self.timing.mark("shell_sent");
        self.state = StreamState::ShellSent;
        tracing::debug!(bytes = html.len(), "shell flushed");
        self.notify(LifecyclePhase::ShellSent);

        Ok(())
    }

    /// Send the patch chunk for `slot`. Shell must be sent first.
    pub async fn send_patch(&mut self, slot: SlotId, chunk: &str) -> Result<(), RenderError> {
        self.ensure_writable()?;

        self.write(chunk.as_bytes().to_vec()).await?;
        self.timing.mark_slot_sent(slot);
        self.patches_sent.push(slot);
        self.last_patch_bytes = chunk.len();
        self.state = StreamState::Patching;
        tracing::debug!(slot = slot.get(), bytes = chunk.len(), "patch written");
        self.notify(LifecyclePhase::SlotPatched {
            slot,
            bytes: chunk.len(),
        });

        Ok(())
    }

    /// Record that the computation behind `slot` has been started.
    ///
    /// Nothing is written; observers see `SlotStarted`.
    pub fn slot_started(&mut self, slot: SlotId) {
        self.timing.mark_slot_start(slot);
        self.notify(LifecyclePhase::SlotStarted(slot));
    }

    /// Send raw bytes. Shell must be sent first.
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), RenderError> {
        self.ensure_writable()?;
        self.write(bytes).await
    }

    /// Write the optional terminator, then flush and close the inner sink.
    pub async fn close(&mut self, terminator: Option<&str>) -> Result<(), RenderError> {
        self.ensure_writable()?;

        if let Some(terminator) = terminator {
            self.write(terminator.as_bytes().to_vec()).await?;
        }
        if let Err(e) = self.inner.close().await {
            return Err(self.fail(e.to_string()));
        }

        self.state = StreamState::Closed;
        self.timing.mark("complete");
        self.notify(LifecyclePhase::Completion);
        Ok(())
    }

    /// Move to `Aborted`. Nothing is written to the inner sink.
    ///
    /// Returns `false` if the sink had already finished.
    pub fn abort(&mut self, reason: &str) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = StreamState::Aborted;
        self.timing.mark("aborted");
        tracing::warn!(reason, "stream aborted");
        self.notify(LifecyclePhase::Aborted(reason.to_string()));
        true
    }

    /// Current sink state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Slots patched so far, in write order.
    pub fn patches_sent(&self) -> &[SlotId] {
        &self.patches_sent
    }

    /// Get the current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        match self.state {
            StreamState::Idle => LifecyclePhase::Start,
            StreamState::ShellSent => LifecyclePhase::ShellSent,
            StreamState::Patching => match self.patches_sent.last() {
                Some(slot) => LifecyclePhase::SlotPatched {
                    slot: *slot,
                    bytes: self.last_patch_bytes,
                },
                None => LifecyclePhase::ShellSent,
            },
            StreamState::Closed => LifecyclePhase::Completion,
            StreamState::Aborted => LifecyclePhase::Aborted("aborted".to_string()),
        }
    }

    /// Get timing context reference.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Get mutable timing context.
    pub fn timing_mut(&mut self) -> &mut TimingContext {
        &mut self.timing
    }

    /// Consume the sink and return the inner value.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn ensure_writable(&self) -> Result<(), RenderError> {
        match self.state {
            StreamState::Idle => Err(RenderError::ShellNotSent),
            StreamState::Closed | StreamState::Aborted => Err(RenderError::SinkClosed),
            StreamState::ShellSent | StreamState::Patching => Ok(()),
        }
    }

    async fn write(&mut self, bytes: Vec<u8>) -> Result<(), RenderError> {
        match self.inner.send(bytes).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e.to_string())),
        }
    }

    fn fail(&mut self, message: String) -> RenderError {
        self.abort(&message);
        RenderError::SinkWrite(message)
    }

    fn notify(&self, phase: LifecyclePhase) {
        let elapsed = self.timing.elapsed();
        for observer in &self.observers {
            observer.on_phase(phase.clone(), elapsed);
        }
    }
}
