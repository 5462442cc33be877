//! Request lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::SlotId;

/// Lifecycle phases for a render session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Request received, nothing written yet.
    Start,
    /// Shell HTML has been flushed to the client.
    ShellSent,
    /// The computation of the given slot has been started.
    SlotStarted(SlotId),
    /// A patch of `bytes` bytes for `slot` has been written.
    SlotPatched { slot: SlotId, bytes: usize },
    /// Terminator written and sink closed.
    Completion,
    /// The session was aborted; no further writes happen.
    Aborted(String),
}

impl LifecyclePhase {
    /// Whether no further writes can follow this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion | Self::Aborted(_))
    }
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Mark slot computation start.
    pub fn mark_slot_start(&mut self, slot: SlotId) {
        self.mark(&format!("slot_{}_start", slot));
    }

    /// Mark slot patch sent.
    pub fn mark_slot_sent(&mut self, slot: SlotId) {
        self.mark(&format!("slot_{}_sent", slot));
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get time to shell flush.
    pub fn time_to_shell(&self) -> Option<Duration> {
        self.marks
            .get("shell_sent")
            .map(|t| t.duration_since(self.start))
    }

    /// Get time to first patch.
    pub fn time_to_first_patch(&self) -> Option<Duration> {
        self.marks
            .iter()
            .filter(|(k, _)| k.ends_with("_sent") && k.starts_with("slot_"))
            .map(|(_, t)| t.duration_since(self.start))
            .min()
    }

    /// Get timing for a specific slot.
    pub fn slot_timing(&self, slot: SlotId) -> Option<SlotTiming> {
        let start = self.marks.get(&format!("slot_{}_start", slot))?;
        let sent = self.marks.get(&format!("slot_{}_sent", slot))?;

        Some(SlotTiming {
            slot,
            start: start.duration_since(self.start),
            sent: sent.duration_since(self.start),
            duration: sent.duration_since(*start),
        })
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing information for a slot.
#[derive(Debug, Clone)]
pub struct SlotTiming {
    /// Slot id.
    pub slot: SlotId,
    /// Time from session start to computation start.
    pub start: Duration,
    /// Time from session start to patch sent.
    pub sent: Duration,
    /// Duration between start and patch.
    pub duration: Duration,
}

/// Observer trait for lifecycle events.
pub trait LifecycleObserver: Send + Sync {
    /// Called when a lifecycle phase occurs.
    fn on_phase(&self, phase: LifecyclePhase, elapsed: Duration);
}
