//! Resolution of async slots into one output stream.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

use futures::stream::FuturesUnordered;
use futures::{Sink, StreamExt};
use ssr_core::{RenderConfig, RenderError, RenderMode, SlotId};
use ssr_streaming::patch::{self, PATCH_RUNTIME, TERMINATOR};
use ssr_streaming::{ComponentNode, ShellRenderer, ShellTemplate, StreamState, StreamingSink};

use crate::fallback::failure_markup;
use crate::slot::{AsyncSlot, Settlement, SlotState, SlotTask};

const DOCTYPE: &str = "<!DOCTYPE html>";

/// Slot tasks that have been started and not yet settled.
pub type InFlight = FuturesUnordered<SlotTask>;

/// Summary of one render session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Mode the session ran in.
    pub mode: RenderMode,
    /// Number of slots in the tree.
    pub slots: usize,
    /// Slots that resolved.
    pub resolved: usize,
    /// Slots whose computation failed.
    pub failed: usize,
    /// Slots not settled when the session ended.
    pub outstanding: usize,
    /// Patch write order (incremental mode only).
    pub patch_order: Vec<SlotId>,
    /// Final sink state.
    pub state: StreamState,
    /// Time from session start to the first write.
    pub time_to_shell: Option<Duration>,
    /// Total session time.
    pub elapsed: Duration,
}

/// Owns the output sink of one request and every slot feeding it.
///
/// All writes go through `&mut self`, one at a time: settlements are
/// taken from the in-flight set and each is written before the next one
/// is looked at. Patches therefore appear in settlement order, after the
/// shell and before the terminator.
pub struct ResolutionStream<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    sink: StreamingSink<S, E>,
    config: RenderConfig,
    template: Option<ShellTemplate>,
    slots: BTreeMap<SlotId, AsyncSlot>,
    shell_flushed: bool,
    outstanding: usize,
    runtime_sent: bool,
    patch_order: Vec<SlotId>,
}

impl<S, E> ResolutionStream<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a stream over `sink`.
    pub fn new(sink: StreamingSink<S, E>, config: RenderConfig) -> Self {
        Self {
            sink,
            config,
            template: None,
            slots: BTreeMap::new(),
            shell_flushed: false,
            outstanding: 0,
            runtime_sent: false,
            patch_order: Vec::new(),
        }
    }

    /// Run the shell renderer and register every slot. Writes nothing.
    pub fn prepare(&mut self, root: ComponentNode) -> Result<(), RenderError> {
        if self.template.is_some() {
            return Err(RenderError::ShellAlreadySent);
        }

        let (template, slots) = ShellRenderer::new().render(root)?.into_parts();
        for slot in slots {
            let slot = AsyncSlot::from(slot);
            self.slots.insert(slot.id(), slot);
        }
        self.outstanding = self.slots.len();
        self.template = Some(template);
        Ok(())
    }

    /// Render the shell and flush it immediately.
    pub async fn begin_session(&mut self, root: ComponentNode) -> Result<(), RenderError> {
        self.prepare(root)?;
        let shell = self.document(|template| template.markup())?;
        self.sink.send_shell(&shell).await?;
        self.shell_flushed = true;
        Ok(())
    }

    /// Start every registered slot.
    ///
    /// The returned set polls all computations concurrently on the
    /// caller's task.
    pub fn launch_all(&mut self) -> Result<InFlight, RenderError> {
        let in_flight = InFlight::new();
        for (id, slot) in self.slots.iter_mut() {
            if slot.state() != SlotState::Pending {
                continue;
            }
            in_flight.push(slot.start()?);
            self.sink.slot_started(*id);
        }
        tracing::debug!(slots = in_flight.len(), "slots launched");
        Ok(in_flight)
    }

    /// Write one patch per settlement until all slots are done, then the
    /// terminator.
    pub async fn drive(&mut self, mut in_flight: InFlight) -> Result<(), RenderError> {
        while let Some(settlement) = in_flight.next().await {
            self.settle(settlement).await?;
        }
        self.finish().await
    }

    /// Record one settlement and write its patch.
    pub async fn settle(&mut self, settlement: Settlement) -> Result<(), RenderError> {
        if !self.shell_flushed {
            return Err(RenderError::ShellNotSent);
        }

        let (id, markup) = self.record(settlement)?;
        let mut chunk = String::new();
        if !self.runtime_sent {
            chunk.push_str(PATCH_RUNTIME);
        }
        chunk.push_str(&patch::patch_record(id, &markup));

        self.sink.send_patch(id, &chunk).await?;
        self.runtime_sent = true;
        self.patch_order.push(id);
        Ok(())
    }

    /// Write the terminator and close, once nothing is outstanding.
    pub async fn finish(&mut self) -> Result<(), RenderError> {
        if self.outstanding > 0 {
            return Err(RenderError::Incomplete(self.outstanding));
        }
        self.sink.close(Some(TERMINATOR)).await
    }

    /// Await every settlement without writing anything.
    ///
    /// Returns the final markup of each slot.
    pub async fn collect(
        &mut self,
        mut in_flight: InFlight,
    ) -> Result<BTreeMap<SlotId, String>, RenderError> {
        let mut resolved = BTreeMap::new();
        while let Some(settlement) = in_flight.next().await {
            let (id, markup) = self.record(settlement)?;
            resolved.insert(id, markup);
        }
        if self.outstanding > 0 {
            return Err(RenderError::Incomplete(self.outstanding));
        }
        Ok(resolved)
    }

    /// Run a whole session in the configured mode.
    pub async fn run(&mut self, root: ComponentNode) -> Result<(), RenderError> {
        match self.config.mode {
            RenderMode::Incremental => {
                self.begin_session(root).await?;
                let in_flight = self.launch_all()?;
                self.drive(in_flight).await
            }
            RenderMode::Eager | RenderMode::Buffered => {
                let html = self.render_substituted(root).await?;
                self.write_whole(&html).await
            }
            RenderMode::FallbackOnly => {
                self.prepare(root)?;
                let html = self.document(|template| template.fallback_markup())?;
                self.write_whole(&html).await
            }
        }
    }

    /// Wait for every slot and return the fully substituted document.
    pub async fn render_substituted(&mut self, root: ComponentNode) -> Result<String, RenderError> {
        self.prepare(root)?;
        let in_flight = self.launch_all()?;
        let resolved = self.collect(in_flight).await?;
        self.document(|template| template.substitute(&resolved))
    }

    /// Stop writing. Unsettled computations are dropped by the caller.
    pub fn abort(&mut self, reason: &str) -> bool {
        self.sink.abort(reason)
    }

    /// Summary of the session so far.
    pub fn report(&self) -> SessionReport {
        let count = |state| self.slots.values().filter(|s| s.state() == state).count();
        SessionReport {
            mode: self.config.mode,
            slots: self.slots.len(),
            resolved: count(SlotState::Resolved),
            failed: count(SlotState::Failed),
            outstanding: self.outstanding,
            patch_order: self.patch_order.clone(),
            state: self.sink.state(),
            time_to_shell: self.sink.timing().time_to_shell(),
            elapsed: self.sink.timing().elapsed(),
        }
    }

    /// Whether the shell has been written.
    pub fn shell_flushed(&self) -> bool {
        self.shell_flushed
    }

    /// Slots not yet settled.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Registered slot by id.
    pub fn slot(&self, id: SlotId) -> Option<&AsyncSlot> {
        self.slots.get(&id)
    }

    /// The underlying sink.
    pub fn sink(&self) -> &StreamingSink<S, E> {
        &self.sink
    }

    /// Consume the stream and return its sink.
    pub fn into_sink(self) -> StreamingSink<S, E> {
        self.sink
    }

    fn record(&mut self, settlement: Settlement) -> Result<(SlotId, String), RenderError> {
        let Settlement { id, outcome } = settlement;
        let slot = self.slots.get_mut(&id).ok_or(RenderError::UnknownSlot(id))?;
        slot.settle(outcome)?;
        self.outstanding -= 1;

        let markup = match (slot.markup(), slot.error()) {
            (Some(markup), _) => markup.to_string(),
            (None, Some(error)) => {
                tracing::warn!(slot = id.get(), error = %format!("{:#}", error), "slot computation failed");
                failure_markup(&self.config, slot.fallback(), error)
            }
            (None, None) => slot.fallback().to_string(),
        };
        Ok((id, markup))
    }

    async fn write_whole(&mut self, html: &str) -> Result<(), RenderError> {
        self.sink.send_shell(html).await?;
        self.shell_flushed = true;
        self.sink.close(None).await
    }

    fn document(&self, render: impl FnOnce(&ShellTemplate) -> String) -> Result<String, RenderError> {
        let template = self.template.as_ref().ok_or(RenderError::ShellNotSent)?;
        Ok(self.with_doctype(&render(template)))
    }

    fn with_doctype(&self, body: &str) -> String {
        if self.config.doctype {
            format!("{}{}", DOCTYPE, body)
        } else {
            body.to_string()
        }
    }
}
